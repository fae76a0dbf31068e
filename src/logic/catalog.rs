use serde::Serialize;
use std::collections::BTreeSet;

use crate::logic::errors::OperationError;
use crate::model::common::LabelValue;
use crate::model::constants::{HYPOTHESIS_DEFAULT, MAX_PRIMARY_OUTCOMES};
use crate::model::experiment::{
    Application, Channel, ConclusionRecommendation, DocumentationLinkKind,
};
use crate::model::reference::{FeatureConfig, Geo, Outcome, TargetingConfig};
use crate::store::traits::Store;

const CONCLUSION_RECOMMENDATIONS: &[ConclusionRecommendation] = &[
    ConclusionRecommendation::Rerun,
    ConclusionRecommendation::Graduate,
    ConclusionRecommendation::ChangeCourse,
    ConclusionRecommendation::Stop,
    ConclusionRecommendation::FollowUp,
];

const DOCUMENTATION_LINK_KINDS: &[DocumentationLinkKind] = &[
    DocumentationLinkKind::DsJira,
    DocumentationLinkKind::DesignDoc,
    DocumentationLinkKind::EngTicket,
];

/// The channels available per application, for form population.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationChannels {
    pub application: LabelValue,
    pub channels: Vec<LabelValue>,
}

/// Read-only snapshot of every valid choice an experiment form can offer.
/// Built fresh per request from the reference store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationSnapshot {
    pub applications: Vec<LabelValue>,
    pub channels: Vec<LabelValue>,
    pub application_configs: Vec<ApplicationChannels>,
    pub conclusion_recommendations: Vec<LabelValue>,
    pub documentation_link: Vec<LabelValue>,
    pub countries: Vec<Geo>,
    pub locales: Vec<Geo>,
    pub languages: Vec<Geo>,
    pub all_feature_configs: Vec<FeatureConfig>,
    pub targeting_configs: Vec<TargetingConfig>,
    pub outcomes: Vec<Outcome>,
    /// Distinct experiment owners, ordered, for ownership filters.
    pub owners: Vec<String>,
    pub hypothesis_default: String,
    pub max_primary_outcomes: usize,
}

impl ConfigurationSnapshot {
    pub async fn load<S: Store>(store: &S) -> Result<Self, OperationError> {
        let application_configs = store
            .list_application_configs()
            .await?
            .into_iter()
            .map(|config| ApplicationChannels {
                application: LabelValue::new(
                    config.application.label(),
                    config.application.value(),
                ),
                channels: config
                    .channels
                    .iter()
                    .map(|c| LabelValue::new(c.label(), c.value()))
                    .collect(),
            })
            .collect();

        let owners: BTreeSet<String> = store
            .list_experiments()
            .await?
            .into_iter()
            .map(|e| e.owner)
            .collect();

        Ok(Self {
            applications: Application::ALL
                .iter()
                .map(|a| LabelValue::new(a.label(), a.value()))
                .collect(),
            channels: Channel::ALL
                .iter()
                .map(|c| LabelValue::new(c.label(), c.value()))
                .collect(),
            application_configs,
            conclusion_recommendations: CONCLUSION_RECOMMENDATIONS
                .iter()
                .map(|r| {
                    LabelValue::new(
                        r.label(),
                        serde_variant_name(r).unwrap_or_default(),
                    )
                })
                .collect(),
            documentation_link: DOCUMENTATION_LINK_KINDS
                .iter()
                .map(|k| {
                    LabelValue::new(
                        k.label(),
                        serde_variant_name(k).unwrap_or_default(),
                    )
                })
                .collect(),
            countries: store.list_countries().await?,
            locales: store.list_locales().await?,
            languages: store.list_languages().await?,
            all_feature_configs: store.list_feature_configs().await?,
            targeting_configs: store.list_targeting_configs().await?,
            outcomes: store.list_outcomes().await?,
            owners: owners.into_iter().collect(),
            hypothesis_default: HYPOTHESIS_DEFAULT.to_string(),
            max_primary_outcomes: MAX_PRIMARY_OUTCOMES,
        })
    }
}

/// The serialized (SCREAMING_SNAKE_CASE) name of a unit enum variant.
fn serde_variant_name<T: Serialize>(value: &T) -> Option<String> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(name)) => Some(name),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::experiments::{ExperimentOperations, RequestContext};
    use crate::model::experiment::ExperimentCreate;
    use crate::seed;
    use crate::store::memory::InMemoryStore;

    #[tokio::test]
    async fn snapshot_lists_every_enumeration() {
        let store = InMemoryStore::with_reference_data(seed::default_reference_data());
        let snapshot = ConfigurationSnapshot::load(&store).await.unwrap();

        assert_eq!(snapshot.applications.len(), Application::ALL.len());
        assert_eq!(snapshot.channels.len(), Channel::ALL.len());
        assert_eq!(snapshot.application_configs.len(), Application::ALL.len());
        assert!(!snapshot.all_feature_configs.is_empty());
        assert!(!snapshot.targeting_configs.is_empty());
        assert_eq!(snapshot.max_primary_outcomes, MAX_PRIMARY_OUTCOMES);
        assert!(snapshot.hypothesis_default.contains("then we will see"));
        assert!(snapshot
            .conclusion_recommendations
            .iter()
            .any(|r| r.value == "CHANGE_COURSE"));
        assert!(snapshot
            .documentation_link
            .iter()
            .any(|k| k.value == "DS_JIRA"));
    }

    #[tokio::test]
    async fn geo_tables_come_back_ordered_by_name() {
        let store = InMemoryStore::with_reference_data(seed::default_reference_data());
        let snapshot = ConfigurationSnapshot::load(&store).await.unwrap();
        let names: Vec<&str> = snapshot.countries.iter().map(|c| c.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[tokio::test]
    async fn owners_are_distinct_and_ordered() {
        let store = InMemoryStore::with_reference_data(seed::default_reference_data());
        let ctx = RequestContext::new("zoe@example.com");
        for name in ["First", "Second"] {
            ExperimentOperations::create(
                &store,
                &ctx,
                ExperimentCreate {
                    name: name.into(),
                    application: Application::Desktop,
                    hypothesis: None,
                    public_description: None,
                    changelog_message: "created".into(),
                },
            )
            .await
            .unwrap();
        }
        ExperimentOperations::create(
            &store,
            &RequestContext::new("abe@example.com"),
            ExperimentCreate {
                name: "Third".into(),
                application: Application::Fenix,
                hypothesis: None,
                public_description: None,
                changelog_message: "created".into(),
            },
        )
        .await
        .unwrap();

        let snapshot = ConfigurationSnapshot::load(&store).await.unwrap();
        assert_eq!(
            snapshot.owners,
            vec!["abe@example.com".to_string(), "zoe@example.com".to_string()]
        );
    }
}
