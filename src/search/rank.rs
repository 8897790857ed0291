use crate::config::schema::{BoostType, IndexConfig, RankConfig};
use crate::indexes::query::{QueryError, SortKey, SortOrder, SortTransform};

/// Projects either a caller-supplied sort or the ranking profile into the
/// sort-key list a search request carries.
pub struct RankingClient {
    profile: RankConfig,
}

impl RankingClient {
    pub fn new(profile: RankConfig) -> Self {
        Self { profile }
    }

    pub fn project(
        &self,
        schema: &IndexConfig,
        sort_field: Option<&str>,
        sort_order: Option<&str>,
    ) -> Result<Vec<SortKey>, QueryError> {
        if let Some(field) = sort_field.filter(|f| !f.is_empty()) {
            let spec = schema
                .field(field)
                .ok_or_else(|| QueryError::InvalidSortField(field.to_owned()))?;
            if !spec.sortable {
                return Err(QueryError::InvalidSortField(field.to_owned()));
            }
            let order = SortOrder::parse(sort_order.unwrap_or_default())?;
            return Ok(vec![SortKey::field(field, order, SortTransform::None)]);
        }

        // Relevance first, then one key per boost in profile order. The
        // fixed order keeps results deterministic under identical inputs.
        let mut keys = vec![SortKey::score_desc()];
        for boost in &self.profile.boosts {
            let key = match boost.boost_type {
                BoostType::Value => SortKey::field(
                    boost.field.as_str(),
                    SortOrder::Desc,
                    SortTransform::Weight(boost.weight),
                ),
                BoostType::Logarithmic => {
                    SortKey::field(boost.field.as_str(), SortOrder::Desc, SortTransform::Log)
                }
                BoostType::Custom => SortKey::field(
                    boost.field.as_str(),
                    SortOrder::Desc,
                    SortTransform::Product(boost.weight),
                ),
                // Ascending is what the legacy profiles expect here.
                BoostType::CatboostV2 => SortKey::field(
                    boost.field.as_str(),
                    SortOrder::Asc,
                    SortTransform::Weight(boost.weight),
                ),
                BoostType::Unspecified => {
                    SortKey::field(boost.field.as_str(), SortOrder::Asc, SortTransform::None)
                }
            };
            keys.push(key);
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexes::query::SortBy;

    fn schema() -> IndexConfig {
        serde_json::from_str(
            r#"{
                "indexName": "products",
                "fields": [
                    {"name": "title", "type": "string", "searchable": true},
                    {"name": "price", "type": "number", "filterable": true, "sortable": true}
                ]
            }"#,
        )
        .unwrap()
    }

    fn profile() -> RankConfig {
        serde_json::from_str(
            r#"{"boosts": [
                {"field": "price", "weight": 2.0, "boostType": "value"},
                {"field": "rating", "boostType": "logarithmic"},
                {"field": "clicks", "weight": 0.5, "boostType": "custom"},
                {"field": "legacy", "weight": 1.0, "boostType": "catboostV2"},
                {"field": "title", "boostType": "plain"}
            ]}"#,
        )
        .unwrap()
    }

    #[test]
    fn caller_sort_must_be_sortable() {
        let client = RankingClient::new(RankConfig::default());
        let err = client
            .project(&schema(), Some("title"), Some("desc"))
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidSortField(_)));

        let err = client
            .project(&schema(), Some("ghost"), Some("desc"))
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidSortField(_)));
    }

    #[test]
    fn caller_sort_order_is_checked() {
        let client = RankingClient::new(RankConfig::default());
        let err = client
            .project(&schema(), Some("price"), Some("downwards"))
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidSortOrder(_)));

        let err = client.project(&schema(), Some("price"), None).unwrap_err();
        assert!(matches!(err, QueryError::InvalidSortOrder(_)));
    }

    #[test]
    fn caller_sort_overrides_the_profile() {
        let client = RankingClient::new(profile());
        let keys = client
            .project(&schema(), Some("price"), Some("desc"))
            .unwrap();
        assert_eq!(
            keys,
            vec![SortKey::field("price", SortOrder::Desc, SortTransform::None)]
        );
    }

    #[test]
    fn profile_projects_in_order_behind_score() {
        let client = RankingClient::new(profile());
        let keys = client.project(&schema(), None, None).unwrap();
        assert_eq!(keys.len(), 6);
        assert_eq!(keys[0], SortKey::score_desc());
        assert_eq!(
            keys[1],
            SortKey::field("price", SortOrder::Desc, SortTransform::Weight(2.0))
        );
        assert_eq!(
            keys[2],
            SortKey::field("rating", SortOrder::Desc, SortTransform::Log)
        );
        assert_eq!(
            keys[3],
            SortKey::field("clicks", SortOrder::Desc, SortTransform::Product(0.5))
        );
        assert_eq!(
            keys[4],
            SortKey::field("legacy", SortOrder::Asc, SortTransform::Weight(1.0))
        );
        assert_eq!(
            keys[5],
            SortKey::field("title", SortOrder::Asc, SortTransform::None)
        );
    }

    #[test]
    fn empty_profile_still_sorts_by_score() {
        let client = RankingClient::new(RankConfig::default());
        let keys = client.project(&schema(), None, None).unwrap();
        assert_eq!(keys, vec![SortKey::score_desc()]);
        assert!(matches!(keys[0].by, SortBy::Score));
    }
}
