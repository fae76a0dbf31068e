use crate::model::experiment::{Application, Channel, FirefoxVersion};
use crate::model::reference::{
    ApplicationConfig, FeatureConfig, Geo, Metric, Outcome, TargetingConfig,
};
use crate::store::memory::ReferenceData;

const PICTURE_IN_PICTURE_SCHEMA: &str = r#"{
    "type": "object",
    "properties": {
        "titleBarEnabled": {"type": "boolean"},
        "durationThresholdSeconds": {"type": "integer", "minimum": 0}
    },
    "additionalProperties": false
}"#;

/// Reference data to bootstrap an empty store: one application config per
/// application, a small geo table, and enough feature/targeting configs and
/// outcomes to exercise every validation path.
pub fn default_reference_data() -> ReferenceData {
    ReferenceData {
        application_configs: application_configs(),
        countries: vec![
            Geo::new("Canada", "CA"),
            Geo::new("France", "FR"),
            Geo::new("United States", "US"),
        ],
        locales: vec![
            Geo::new("English (US)", "en-US"),
            Geo::new("French", "fr"),
            Geo::new("German", "de"),
        ],
        languages: vec![
            Geo::new("English", "en"),
            Geo::new("French", "fr"),
            Geo::new("German", "de"),
        ],
        feature_configs: feature_configs(),
        targeting_configs: targeting_configs(),
        outcomes: outcomes(),
    }
}

fn application_configs() -> Vec<ApplicationConfig> {
    vec![
        ApplicationConfig {
            application: Application::Desktop,
            channels: vec![
                Channel::NoChannel,
                Channel::Unbranded,
                Channel::Nightly,
                Channel::Beta,
                Channel::Release,
                Channel::Esr,
            ],
            publish_collection: "nimbus-desktop-experiments".into(),
            languages_supported_version: None,
            countries_supported_version: None,
            rollout_supported_version: None,
        },
        ApplicationConfig {
            application: Application::Fenix,
            channels: vec![Channel::Nightly, Channel::Beta, Channel::Release],
            publish_collection: "nimbus-mobile-experiments".into(),
            languages_supported_version: Some(FirefoxVersion::new(102)),
            countries_supported_version: Some(FirefoxVersion::new(102)),
            rollout_supported_version: Some(FirefoxVersion::new(105)),
        },
        ApplicationConfig {
            application: Application::Ios,
            channels: vec![
                Channel::Nightly,
                Channel::Beta,
                Channel::Release,
                Channel::Testflight,
            ],
            publish_collection: "nimbus-mobile-experiments".into(),
            languages_supported_version: Some(FirefoxVersion::new(102)),
            countries_supported_version: Some(FirefoxVersion::new(102)),
            rollout_supported_version: Some(FirefoxVersion::new(105)),
        },
        ApplicationConfig {
            application: Application::FocusAndroid,
            channels: vec![Channel::Nightly, Channel::Beta, Channel::Release],
            publish_collection: "nimbus-mobile-experiments".into(),
            languages_supported_version: Some(FirefoxVersion::new(102)),
            countries_supported_version: Some(FirefoxVersion::new(102)),
            rollout_supported_version: Some(FirefoxVersion::new(105)),
        },
        ApplicationConfig {
            application: Application::FocusIos,
            channels: vec![Channel::Release, Channel::Testflight],
            publish_collection: "nimbus-mobile-experiments".into(),
            languages_supported_version: Some(FirefoxVersion::new(108)),
            countries_supported_version: Some(FirefoxVersion::new(108)),
            rollout_supported_version: Some(FirefoxVersion::new(108)),
        },
    ]
}

fn feature_configs() -> Vec<FeatureConfig> {
    vec![
        FeatureConfig {
            slug: "no-feature-desktop".into(),
            name: "No Feature (Desktop)".into(),
            description: "Placeholder feature with no payload".into(),
            application: Application::Desktop,
            owner_email: "desktop@example.com".into(),
            schema: None,
        },
        FeatureConfig {
            slug: "no-feature-fenix".into(),
            name: "No Feature (Fenix)".into(),
            description: "Placeholder feature with no payload".into(),
            application: Application::Fenix,
            owner_email: "fenix@example.com".into(),
            schema: None,
        },
        FeatureConfig {
            slug: "picture-in-picture".into(),
            name: "Picture-in-Picture".into(),
            description: "Video overlay playback controls".into(),
            application: Application::Desktop,
            owner_email: "media@example.com".into(),
            schema: Some(PICTURE_IN_PICTURE_SCHEMA.into()),
        },
    ]
}

fn targeting_configs() -> Vec<TargetingConfig> {
    vec![
        TargetingConfig {
            slug: "no-targeting".into(),
            name: "No Targeting".into(),
            description: "All clients".into(),
            applications: Application::ALL.to_vec(),
            sticky_required: false,
            is_first_run_required: false,
        },
        TargetingConfig {
            slug: "first-run".into(),
            name: "First Run".into(),
            description: "Clients on their first session".into(),
            applications: vec![Application::Fenix, Application::Ios],
            sticky_required: true,
            is_first_run_required: true,
        },
        TargetingConfig {
            slug: "mac-only".into(),
            name: "Mac OS Only".into(),
            description: "Desktop clients running Mac OS".into(),
            applications: vec![Application::Desktop],
            sticky_required: false,
            is_first_run_required: false,
        },
    ]
}

fn outcomes() -> Vec<Outcome> {
    vec![
        Outcome {
            slug: "default-browser".into(),
            friendly_name: "Default Browser".into(),
            application: Application::Desktop,
            description: "Tracks default browser assignments".into(),
            is_default: false,
            metrics: vec![Metric {
                slug: "mozilla_default_browser".into(),
                friendly_name: "Mozilla Default Browser".into(),
                description: "Whether Firefox is the default browser".into(),
            }],
        },
        Outcome {
            slug: "picture-in-picture".into(),
            friendly_name: "Picture-in-Picture".into(),
            application: Application::Desktop,
            description: "Engagement with video overlay playback".into(),
            is_default: false,
            metrics: Vec::new(),
        },
        Outcome {
            slug: "tabs-summary".into(),
            friendly_name: "Tabs Summary".into(),
            application: Application::Desktop,
            description: "Tab open and close counts".into(),
            is_default: true,
            metrics: Vec::new(),
        },
        Outcome {
            slug: "retention".into(),
            friendly_name: "Retention".into(),
            application: Application::Fenix,
            description: "Client retention over the experiment window".into(),
            is_default: true,
            metrics: Vec::new(),
        },
    ]
}
