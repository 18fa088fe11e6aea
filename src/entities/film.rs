use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "films")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub external_id: Option<i32>,
    pub title: String,
    /// Normalized title used for case-insensitive matching.
    pub title_key: String,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub poster_url: Option<String>,
    pub vote_average: Option<f64>,
    pub is_oscar_winner: bool,
    pub is_bafta_winner: bool,
    pub bafta_winner_year: Option<i32>,
    pub recommend_count: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::award::Entity")]
    Award,
    #[sea_orm(has_many = "super::review::Entity")]
    Review,
}

impl Related<super::award::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Award.def()
    }
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Review.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// True when enrichment has nothing left to fill in. Zero ratings and
    /// blank strings count as missing.
    pub fn has_complete_metadata(&self) -> bool {
        let present = |s: &Option<String>| s.as_deref().is_some_and(|s| !s.trim().is_empty());
        self.external_id.is_some()
            && present(&self.release_date)
            && present(&self.overview)
            && self.vote_average.is_some_and(|v| v > 0.0)
    }
}
