use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "awards")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Ledger title, verbatim.
    pub film_title: String,
    pub film_key: String,
    /// Lowercased title with punctuation removed, for containment search.
    pub film_match_key: String,
    pub film_release_year: i32,
    pub ceremony_year: i32,
    pub actor_id: i32,
    pub category_id: Option<i32>,
    pub winner: bool,
    pub poster_url: Option<String>,
    pub film_id: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::actor::Entity",
        from = "Column::ActorId",
        to = "super::actor::Column::Id"
    )]
    Actor,
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
    #[sea_orm(
        belongs_to = "super::ceremony_year::Entity",
        from = "Column::CeremonyYear",
        to = "super::ceremony_year::Column::Year"
    )]
    CeremonyYear,
    #[sea_orm(
        belongs_to = "super::film::Entity",
        from = "Column::FilmId",
        to = "super::film::Column::Id"
    )]
    Film,
}

impl Related<super::actor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Actor.def()
    }
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::ceremony_year::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CeremonyYear.def()
    }
}

impl Related<super::film::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Film.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
