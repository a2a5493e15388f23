//! Conformance assertions every [`Adapter`] should satisfy.
//!
//! ```rust,ignore
//! use meshgate_interfaces::testing;
//!
//! testing::assert_pre_start_conformance(&adapter).await;
//! adapter.start().await?;
//! testing::assert_stop_conformance(&adapter).await;
//! ```

use std::time::Duration;

use meshgate_core::constants::HEADER_MAXSIZE;

use crate::error::AdapterError;
use crate::traits::Adapter;

pub fn assert_has_name(adapter: &impl Adapter) {
    assert!(!adapter.name().is_empty(), "adapter name must not be empty");
}

/// The MTU must leave room for at least one body byte behind the largest header.
pub fn assert_mtu_fits_header(adapter: &impl Adapter) {
    assert!(
        adapter.mtu() > HEADER_MAXSIZE,
        "mtu {} cannot carry a frame with two crypto addresses",
        adapter.mtu()
    );
}

pub fn assert_not_connected_before_start(adapter: &impl Adapter) {
    assert!(
        !adapter.is_connected(),
        "adapter should not be connected before start()"
    );
}

pub async fn assert_write_before_start_fails(adapter: &impl Adapter) {
    match adapter.write_frame(&[0x42; 20]).await {
        Err(AdapterError::NotConnected) | Err(AdapterError::Configuration(_)) => {}
        Err(e) => panic!("unexpected error from write before start: {e}"),
        Ok(()) => panic!("write should fail before start()"),
    }
}

pub async fn assert_stop_is_clean(adapter: &impl Adapter) {
    let result = adapter.stop().await;
    assert!(result.is_ok(), "stop() should succeed: {:?}", result.err());
    assert!(
        !adapter.is_connected(),
        "is_connected() should be false after stop()"
    );
}

pub async fn assert_double_stop_is_idempotent(adapter: &impl Adapter) {
    let _ = adapter.stop().await;
    let result = adapter.stop().await;
    assert!(
        result.is_ok(),
        "second stop() should be idempotent: {:?}",
        result.err()
    );
}

/// After `stop()`, reads must end instead of hanging.
pub async fn assert_read_after_stop_ends(adapter: &impl Adapter) {
    let read = tokio::time::timeout(Duration::from_secs(1), adapter.read_frame()).await;
    match read {
        Ok(Ok(None)) | Ok(Err(AdapterError::Stopped)) => {}
        Ok(Ok(Some(frame))) => panic!("read a {}-byte frame after stop()", frame.len()),
        Ok(Err(e)) => panic!("unexpected error from read after stop: {e}"),
        Err(_) => panic!("read_frame() hung after stop()"),
    }
}

pub async fn assert_pre_start_conformance(adapter: &impl Adapter) {
    assert_has_name(adapter);
    assert_mtu_fits_header(adapter);
    assert_not_connected_before_start(adapter);
    assert_write_before_start_fails(adapter).await;
}

pub async fn assert_stop_conformance(adapter: &impl Adapter) {
    assert_stop_is_clean(adapter).await;
    assert_double_stop_is_idempotent(adapter).await;
}
