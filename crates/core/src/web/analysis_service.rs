use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::detection::domain::detector::DetectorSet;
use crate::error::InputError;

use super::session_registry::SessionRegistry;
use super::wire::{AnalyzeRequest, AnalyzeResponse};

/// Request handling behind the HTTP server, independent of the transport.
///
/// Payload decoding runs without locks. Analysis takes the detector lock and
/// then the registry lock, always in that order, so concurrent requests are
/// serialized through the shared detectors.
pub struct AnalysisService {
    detectors: Mutex<DetectorSet>,
    sessions: Mutex<SessionRegistry>,
}

impl AnalysisService {
    pub fn new(detectors: DetectorSet, sessions: SessionRegistry) -> Self {
        Self {
            detectors: Mutex::new(detectors),
            sessions: Mutex::new(sessions),
        }
    }

    /// Analyzes one uploaded frame for `session_id`.
    ///
    /// A malformed request leaves every session untouched.
    pub fn analyze(&self, session_id: &str, body: &[u8]) -> Result<AnalyzeResponse, InputError> {
        let request = AnalyzeRequest::parse(body)?;
        let band = request.band()?;
        let frame = request.frame()?;
        let gray = frame.to_gray();

        let started = Instant::now();
        let mut detectors = lock(&self.detectors);
        let result = lock(&self.sessions).with_tracker(session_id, |tracker| {
            tracker.analyze_gray(&mut detectors, &gray, &band)
        });
        drop(detectors);
        log::debug!(
            "Session {session_id}: {} in {:.1}ms",
            result.status,
            started.elapsed().as_secs_f64() * 1000.0
        );
        Ok(AnalyzeResponse::from(&result))
    }

    pub fn end_session(&self, session_id: &str) -> bool {
        lock(&self.sessions).end(session_id)
    }

    pub fn session_count(&self) -> usize {
        lock(&self.sessions).len()
    }
}

/// Lock, recovering the guard if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
