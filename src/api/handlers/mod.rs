//! HTTP request handlers

pub mod health;
pub mod models;
pub mod composites;
pub mod sessions;
pub mod editor;
pub mod preview;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use actix_web::web;

    use crate::config::Settings;
    use crate::engine::{test_context, SessionRegistry};
    use crate::AppState;

    pub fn state() -> web::Data<AppState> {
        let mut settings = Settings::default();
        settings.sessions.preview_poll_timeout_secs = 1;
        let engine = test_context();
        let sessions = Arc::new(SessionRegistry::new(engine.clone(), 8, Duration::from_secs(60)));

        web::Data::new(AppState {
            settings,
            engine,
            sessions,
            started_at: Instant::now(),
        })
    }
}
