//! Create-or-fetch for the small natural-key entities.
//!
//! Each call is a lookup followed by an insert on a miss. The two steps are
//! not atomic across connections: callers must serialize calls for the same
//! key, which the ingestion pipeline does by processing rows one at a time
//! on a single transaction.

use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set};

use crate::entities::{actor, category, ceremony_year};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NaturalKey<'a> {
    Actor(&'a str),
    Category(&'a str),
    CeremonyYear(i32),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EntityRef {
    Actor(i32),
    Category(i32),
    CeremonyYear(i32),
}

impl EntityRef {
    pub fn id(self) -> i32 {
        match self {
            EntityRef::Actor(id) | EntityRef::Category(id) | EntityRef::CeremonyYear(id) => id,
        }
    }
}

/// Returns the entity for a natural key, creating it on first reference.
pub async fn resolve<C>(conn: &C, key: NaturalKey<'_>) -> Result<EntityRef, DbErr>
where
    C: ConnectionTrait,
{
    Ok(match key {
        NaturalKey::Actor(name) => EntityRef::Actor(resolve_actor(conn, name).await?),
        NaturalKey::Category(name) => EntityRef::Category(resolve_category(conn, name).await?),
        NaturalKey::CeremonyYear(year) => {
            EntityRef::CeremonyYear(resolve_ceremony_year(conn, year).await?)
        },
    })
}

async fn resolve_actor<C>(conn: &C, name: &str) -> Result<i32, DbErr>
where
    C: ConnectionTrait,
{
    let name = name.trim();
    if let Some(existing) =
        actor::Entity::find().filter(actor::Column::Name.eq(name)).one(conn).await?
    {
        return Ok(existing.id);
    }
    let created = actor::ActiveModel { name: Set(name.to_string()), ..Default::default() }
        .insert(conn)
        .await?;
    Ok(created.id)
}

async fn resolve_category<C>(conn: &C, name: &str) -> Result<i32, DbErr>
where
    C: ConnectionTrait,
{
    let name = name.trim();
    if let Some(existing) =
        category::Entity::find().filter(category::Column::Name.eq(name)).one(conn).await?
    {
        return Ok(existing.id);
    }
    let created = category::ActiveModel { name: Set(name.to_string()), ..Default::default() }
        .insert(conn)
        .await?;
    Ok(created.id)
}

async fn resolve_ceremony_year<C>(conn: &C, year: i32) -> Result<i32, DbErr>
where
    C: ConnectionTrait,
{
    if ceremony_year::Entity::find_by_id(year).one(conn).await?.is_none() {
        ceremony_year::Entity::insert(ceremony_year::ActiveModel { year: Set(year) })
            .exec_without_returning(conn)
            .await?;
    }
    Ok(year)
}

#[cfg(test)]
mod tests {
    use sea_orm::PaginatorTrait;

    use super::*;
    use crate::db;

    #[tokio::test]
    async fn repeated_resolve_reuses_entity() {
        let db = db::memory().await;

        let first = resolve(&db, NaturalKey::Actor("Frances McDormand")).await.unwrap();
        let second = resolve(&db, NaturalKey::Actor(" Frances McDormand ")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(actor::Entity::find().count(&db).await.unwrap(), 1);

        let a = resolve(&db, NaturalKey::Category("Best Picture")).await.unwrap();
        let b = resolve(&db, NaturalKey::Category("Best Director")).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn ceremony_year_is_its_own_key() {
        let db = db::memory().await;

        assert_eq!(
            resolve(&db, NaturalKey::CeremonyYear(2020)).await.unwrap(),
            EntityRef::CeremonyYear(2020)
        );
        resolve(&db, NaturalKey::CeremonyYear(2020)).await.unwrap();
        assert_eq!(ceremony_year::Entity::find().count(&db).await.unwrap(), 1);
    }
}
