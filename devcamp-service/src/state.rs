//! Application state management

use std::sync::Arc;

use axum::extract::FromRef;

use crate::config::Config;
use crate::failure::ErrorResponder;
use crate::query::FeatureDefaults;
use crate::store::{Collection, CollectionSchema};

/// Application state shared across handlers
///
/// Cheap to clone: the config is behind an `Arc` and collections share their
/// documents between clones.
#[derive(Debug, Clone)]
pub struct AppState {
    config: Arc<Config>,
    responder: ErrorResponder,
    features: Arc<FeatureDefaults>,
    bootcamps: Collection,
    courses: Collection,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl AppState {
    /// Create state with empty collections
    pub fn new(config: Config) -> Self {
        Self::builder().config(config).build()
    }

    /// Create a new builder for AppState
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Failure renderer for the configured environment
    pub fn responder(&self) -> ErrorResponder {
        self.responder
    }

    /// Query feature defaults for list endpoints
    pub fn feature_defaults(&self) -> &FeatureDefaults {
        &self.features
    }

    /// Bootcamp collection
    pub fn bootcamps(&self) -> &Collection {
        &self.bootcamps
    }

    /// Course collection
    pub fn courses(&self) -> &Collection {
        &self.courses
    }
}

impl FromRef<AppState> for ErrorResponder {
    fn from_ref(state: &AppState) -> Self {
        state.responder
    }
}

/// Builder for AppState
#[derive(Debug, Default)]
pub struct AppStateBuilder {
    config: Option<Config>,
    bootcamps: Option<Collection>,
    courses: Option<Collection>,
}

impl AppStateBuilder {
    /// Create a new builder
    ///
    /// Unset parts fall back to `Config::default()` and empty collections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Use an existing bootcamp collection
    pub fn bootcamps(mut self, collection: Collection) -> Self {
        self.bootcamps = Some(collection);
        self
    }

    /// Use an existing course collection
    pub fn courses(mut self, collection: Collection) -> Self {
        self.courses = Some(collection);
        self
    }

    /// Build the AppState
    ///
    /// The error responder and feature defaults are derived from the config
    /// here, once.
    pub fn build(self) -> AppState {
        let config = self.config.unwrap_or_default();
        let responder = ErrorResponder::new(config.service.environment);
        let features = Arc::new(config.feature_defaults());

        tracing::debug!(
            environment = %config.service.environment,
            max_limit = ?features.max_limit,
            "application state built"
        );

        AppState {
            config: Arc::new(config),
            responder,
            features,
            bootcamps: self
                .bootcamps
                .unwrap_or_else(|| Collection::new(CollectionSchema::bootcamps())),
            courses: self
                .courses
                .unwrap_or_else(|| Collection::new(CollectionSchema::courses())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;

    #[test]
    fn test_state_derives_responder_from_environment() {
        let mut config = Config::default();
        config.service.environment = Environment::Production;
        config.query.max_limit = Some(20);

        let state = AppState::new(config);
        assert_eq!(state.responder().environment(), Environment::Production);
        assert_eq!(state.feature_defaults().max_limit, Some(20));
        assert_eq!(state.bootcamps().schema().name(), "bootcamps");
        assert_eq!(state.courses().schema().name(), "courses");
    }

    #[tokio::test]
    async fn test_clones_share_collections() {
        let state = AppState::default();
        let clone = state.clone();

        let course = serde_json::json!({
            "title": "Front End Web Development",
            "description": "x",
            "weeks": 8,
            "tuition": 8000,
            "minimumSkill": "beginner",
            "bootcamp": "5d713995b721c3bb38c1f5d0",
        });
        clone
            .courses()
            .insert(course.as_object().cloned().unwrap())
            .await
            .unwrap();

        assert_eq!(state.courses().len().await, 1);
    }
}
