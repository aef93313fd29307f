use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::capture::CaptureError;
use crate::decoder::{Decoder, DecoderError};
use crate::frame_sampler::AlwaysDecode;
use crate::testing::{CountingDecoder, MockBackend, StubVerifier, BRIGHT, DARK, SARA_ID};
use crate::verification_service::{VerificationResult, VerifyError};

type Session = ScanSession<MockBackend, StubVerifier>;

fn env(backend: MockBackend, verifier: StubVerifier, decoded: Option<&str>) -> ScanEnvironment<MockBackend, StubVerifier> {
    ScanEnvironment::new(Arc::new(backend), Arc::new(verifier))
        .with_decoder(Arc::new(LazyDecoder::ready(Arc::new(CountingDecoder::returning(decoded)))))
}

async fn wait_for(session: &Session, pred: impl Fn(&ScanState) -> bool) -> ScanState {
    let mut rx = session.subscribe();
    let state = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| pred(s)))
        .await
        .expect("state not reached in time")
        .expect("session state channel closed")
        .clone();
    state
}

fn is_result(state: &ScanState) -> bool {
    matches!(state, ScanState::Result(_))
}

#[tokio::test]
async fn test_scan_to_result_releases_once() {
    let env = env(MockBackend::solid(DARK), StubVerifier::new(), Some(SARA_ID));
    let backend = env.backend.clone();
    let verifier = env.verifier.clone();
    let mut session = ScanSession::new(env);

    session.open().await.unwrap();
    let state = wait_for(&session, is_result).await;

    let ScanState::Result(result) = state else { unreachable!() };
    assert!(result.admits());
    assert_eq!(result.name.as_deref(), Some("Sara Ahmed"));
    assert!(session.scanned_once());
    assert_eq!(session.candidate().as_deref(), Some(SARA_ID));
    assert_eq!(verifier.seen(), vec![SARA_ID.to_string()]);

    session.close().await;
    session.close().await;
    assert_eq!(backend.releases(), 1);
    assert_eq!(session.state(), ScanState::Closed);
}

#[tokio::test]
async fn test_second_candidate_is_dropped() {
    let env = env(MockBackend::solid(BRIGHT), StubVerifier::new(), None);
    let verifier = env.verifier.clone();
    let mut session = ScanSession::new(env);
    session.open().await.unwrap();

    assert!(session.on_candidate(SARA_ID));
    assert!(!session.on_candidate(SARA_ID));
    assert!(!session.on_candidate("another-code"));

    wait_for(&session, is_result).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(verifier.calls(), 1);
    session.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_candidates_forward_once() {
    let env = env(MockBackend::solid(BRIGHT), StubVerifier::new(), None);
    let verifier = env.verifier.clone();
    let mut session = ScanSession::new(env);
    session.open().await.unwrap();

    let session = Arc::new(session);
    let mut handles = Vec::new();
    for _ in 0..16 {
        let session = session.clone();
        handles.push(tokio::spawn(async move { session.on_candidate(SARA_ID) }));
    }
    let mut latched = 0;
    for handle in handles {
        if handle.await.unwrap() {
            latched += 1;
        }
    }
    assert_eq!(latched, 1);

    let mut session = Arc::try_unwrap(session).ok().unwrap();
    wait_for(&session, is_result).await;
    assert_eq!(verifier.calls(), 1);
    session.close().await;
}

#[tokio::test]
async fn test_capture_released_when_candidate_latched() {
    let env = env(MockBackend::solid(BRIGHT), StubVerifier::new().with_delay(Duration::from_millis(200)), None);
    let backend = env.backend.clone();
    let devices = env.devices.clone();
    let mut session = ScanSession::new(env);
    session.open().await.unwrap();

    session.on_candidate(SARA_ID);
    wait_for(&session, |s| matches!(s, ScanState::Verifying { .. })).await;

    // Sampler exits promptly even though verification is still pending
    tokio::time::timeout(Duration::from_secs(1), async {
        while backend.releases() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert!(!devices.is_leased("mock-rear").await);

    session.close().await;
    assert_eq!(backend.releases(), 1);
}

#[tokio::test]
async fn test_permission_denied_then_reopen() {
    let backend = MockBackend::solid(DARK)
        .failing_first(vec![CaptureError::PermissionDenied("user dismissed prompt".to_string())]);
    let env = env(backend, StubVerifier::new(), Some(SARA_ID));
    let backend = env.backend.clone();
    let mut session = ScanSession::new(env);

    let err = session.open().await.unwrap_err();
    assert_eq!(err, SessionError::Capture(ErrorKind::PermissionDenied));
    assert_eq!(session.state(), ScanState::Error(ErrorKind::PermissionDenied));
    assert_eq!(session.last_error(), Some(ErrorKind::PermissionDenied));
    assert_eq!(backend.releases(), 0);

    session.open().await.unwrap();
    let state = wait_for(&session, is_result).await;
    assert!(matches!(state, ScanState::Result(r) if r.registered));
    assert_eq!(backend.acquisitions(), 2);
    assert_eq!(session.last_error(), None);

    session.close().await;
    assert_eq!(backend.releases(), 1);
}

#[tokio::test]
async fn test_open_twice_is_invalid() {
    let mut session = ScanSession::new(env(MockBackend::solid(BRIGHT), StubVerifier::new(), None));
    session.open().await.unwrap();

    let err = session.open().await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidState { action: "open", .. }));
    assert_eq!(err.kind(), None);
    session.close().await;
}

#[tokio::test]
async fn test_insecure_context_never_acquires() {
    let env = env(MockBackend::solid(DARK).insecure(), StubVerifier::new(), None);
    let backend = env.backend.clone();
    let mut session = ScanSession::new(env);

    let err = session.open().await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::InsecureContext));
    assert_eq!(backend.acquisitions(), 0);
}

#[tokio::test]
async fn test_unsupported_environment() {
    let mut session = ScanSession::new(env(MockBackend::solid(DARK).unsupported(), StubVerifier::new(), None));
    let err = session.open().await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::UnsupportedEnvironment));
}

#[tokio::test]
async fn test_second_session_on_same_device_is_busy() {
    let first_env = env(MockBackend::solid(BRIGHT), StubVerifier::new(), None);
    let backend = first_env.backend.clone();
    let second_env = first_env.clone();

    let mut first = ScanSession::new(first_env);
    let mut second = ScanSession::new(second_env);

    first.open().await.unwrap();
    let err = second.open().await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::DeviceBusy));
    // The rejected stream was stopped
    assert_eq!(backend.releases(), 1);

    first.close().await;
    assert_eq!(backend.releases(), 2);

    second.open().await.unwrap();
    second.close().await;
    assert_eq!(backend.releases(), 3);
}

#[tokio::test]
async fn test_stream_end_is_acquisition_aborted() {
    let env = env(MockBackend::solid(BRIGHT).ending_after(3), StubVerifier::new(), None);
    let backend = env.backend.clone();
    let mut session = ScanSession::new(env);
    session.open().await.unwrap();

    let state = wait_for(&session, ScanState::is_terminal).await;
    assert_eq!(state, ScanState::Error(ErrorKind::AcquisitionAborted));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(backend.releases(), 1);
}

#[tokio::test]
async fn test_close_while_verifying_discards_result() {
    let env = env(
        MockBackend::solid(DARK),
        StubVerifier::new().with_delay(Duration::from_millis(100)),
        Some(SARA_ID),
    );
    let backend = env.backend.clone();
    let mut session = ScanSession::new(env);
    session.open().await.unwrap();

    wait_for(&session, |s| matches!(s, ScanState::Verifying { .. })).await;
    session.close().await;
    assert_eq!(session.state(), ScanState::Closed);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(session.state(), ScanState::Closed);
    assert_eq!(backend.releases(), 1);
}

#[tokio::test]
async fn test_verify_timeout_then_resubmit() {
    let verifier = StubVerifier::new().with_delay(Duration::from_millis(300));
    let env = env(MockBackend::solid(DARK), verifier, Some(SARA_ID)).with_config(ScanConfig {
        verify_timeout_ms: 50,
        ..ScanConfig::default()
    });
    let backend = env.backend.clone();
    let verifier = env.verifier.clone();
    let mut session = ScanSession::new(env);
    session.open().await.unwrap();

    let state = wait_for(&session, ScanState::is_terminal).await;
    assert_eq!(state, ScanState::Error(ErrorKind::NetworkError));
    assert_eq!(session.last_error(), Some(ErrorKind::NetworkError));

    verifier.set_delay(Duration::ZERO);
    assert!(session.retry_verification());
    let state = wait_for(&session, is_result).await;
    assert!(matches!(state, ScanState::Result(r) if r.admits()));

    assert_eq!(verifier.seen(), vec![SARA_ID.to_string(), SARA_ID.to_string()]);
    assert_eq!(backend.acquisitions(), 1);
    session.close().await;
}

#[tokio::test]
async fn test_server_error_is_retryable_not_found_is_not() {
    let verifier = StubVerifier::new().failing_first(vec![VerifyError::Server("HTTP 503".to_string())]);
    let mut session = ScanSession::new(env(MockBackend::solid(DARK), verifier, Some("00000000000000")));
    session.open().await.unwrap();

    let state = wait_for(&session, ScanState::is_terminal).await;
    assert_eq!(state, ScanState::Error(ErrorKind::ServerError));

    assert!(session.retry_verification());
    let state = wait_for(&session, is_result).await;
    assert_eq!(state, ScanState::Result(VerificationResult::not_registered()));

    // Negative result is final for this session
    assert!(!session.retry_verification());
    session.close().await;
}

#[tokio::test]
async fn test_retry_without_failure_is_noop() {
    let mut session = ScanSession::new(env(MockBackend::solid(BRIGHT), StubVerifier::new(), None));
    assert!(!session.retry_verification());
    session.open().await.unwrap();
    assert!(!session.retry_verification());
    session.close().await;
}

#[tokio::test]
async fn test_candidate_after_close_is_ignored() {
    let env = env(MockBackend::solid(BRIGHT), StubVerifier::new(), None);
    let verifier = env.verifier.clone();
    let mut session = ScanSession::new(env);
    session.open().await.unwrap();
    session.close().await;

    assert!(!session.on_candidate(SARA_ID));
    assert!(!session.scanned_once());
    assert_eq!(verifier.calls(), 0);
}

#[tokio::test]
async fn test_decoder_unavailable_keeps_sampling() {
    let available = Arc::new(AtomicBool::new(false));
    let decoder = LazyDecoder::new({
        let available = available.clone();
        move || {
            let ok = available.load(Ordering::SeqCst);
            async move {
                if ok {
                    Ok(Arc::new(CountingDecoder::returning(Some(SARA_ID))) as Arc<dyn Decoder>)
                } else {
                    Err(DecoderError::Unavailable("decoder asset unreachable".to_string()))
                }
            }
        }
    });
    let decoder = Arc::new(decoder);
    let env = ScanEnvironment::new(Arc::new(MockBackend::solid(DARK)), Arc::new(StubVerifier::new()))
        .with_decoder(decoder.clone());
    let mut session = ScanSession::new(env);
    session.open().await.unwrap();

    tokio::time::timeout(Duration::from_secs(1), async {
        while session.last_error() != Some(ErrorKind::DecoderUnavailable) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(session.state(), ScanState::Sampling);

    available.store(true, Ordering::SeqCst);
    wait_for(&session, is_result).await;
    assert!(decoder.load_attempts() >= 2);
    session.close().await;
}

#[tokio::test]
async fn test_gate_can_be_replaced() {
    let counting = Arc::new(CountingDecoder::returning(Some(SARA_ID)));
    let env = ScanEnvironment::new(Arc::new(MockBackend::solid(BRIGHT)), Arc::new(StubVerifier::new()))
        .with_decoder(Arc::new(LazyDecoder::ready(counting.clone())))
        .with_gate(Arc::new(AlwaysDecode));
    let mut session = ScanSession::new(env);
    session.open().await.unwrap();

    wait_for(&session, is_result).await;
    assert_eq!(counting.calls(), 1);
    session.close().await;
}

#[tokio::test]
async fn test_drop_releases_capture() {
    let env = env(MockBackend::solid(BRIGHT), StubVerifier::new(), None);
    let backend = env.backend.clone();
    let mut session = ScanSession::new(env);
    session.open().await.unwrap();
    drop(session);

    tokio::time::timeout(Duration::from_secs(1), async {
        while backend.releases() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(backend.releases(), 1);
}
