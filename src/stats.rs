//! Read-only statistics over the award graph.
//!
//! Every query here is independent of the others and only reads committed
//! data, so they can run alongside each other and alongside ingestion.

use std::collections::{BTreeMap, HashMap, HashSet};

use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, FromQueryResult, JoinType, QueryFilter,
    QueryOrder, QuerySelect, QueryTrait, RelationTrait,
};
use serde::Serialize;

use crate::{
    entities::{actor, award, category, film},
    matcher,
};

pub const TOP_WINNERS_LIMIT: u64 = 100;
pub const MOST_AWARDED_LIMIT: u64 = 20;
pub const UNKNOWN_CATEGORY: &str = "Unknown";
pub const UNDERRATED_MIN_RATING: f64 = 8.0;

#[derive(Debug, FromQueryResult)]
struct AwardView {
    ceremony_year: i32,
    film_title: String,
    category: Option<String>,
    recipient: Option<String>,
    winner: bool,
    poster_url: Option<String>,
    film_id: Option<i32>,
    film_poster_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct YearEntry {
    pub movie_id: Option<i32>,
    pub film: String,
    pub category: Option<String>,
    pub recipient: Option<String>,
    pub poster_url: Option<String>,
    pub year: i32,
    pub winner: bool,
}

/// Awards grouped by ceremony year, one entry per (year, film, category).
///
/// Entries keep the first occurrence in ceremony-year order, prefer the
/// matched film's poster over the award's own, and are dropped when they
/// have neither a poster nor a matched film.
pub async fn oscars_by_year<C>(conn: &C) -> Result<BTreeMap<i32, Vec<YearEntry>>, DbErr>
where
    C: ConnectionTrait,
{
    let rows = award::Entity::find()
        .select_only()
        .columns([
            award::Column::CeremonyYear,
            award::Column::FilmTitle,
            award::Column::Winner,
            award::Column::PosterUrl,
            award::Column::FilmId,
        ])
        .column_as(category::Column::Name, "category")
        .column_as(actor::Column::Name, "recipient")
        .column_as(film::Column::PosterUrl, "film_poster_url")
        .join(JoinType::LeftJoin, award::Relation::Category.def())
        .join(JoinType::LeftJoin, award::Relation::Actor.def())
        .join(JoinType::LeftJoin, award::Relation::Film.def())
        .order_by_asc(award::Column::CeremonyYear)
        .order_by_asc(award::Column::Id)
        .into_model::<AwardView>()
        .all(conn)
        .await?;

    Ok(group_by_year(rows))
}

fn group_by_year(rows: Vec<AwardView>) -> BTreeMap<i32, Vec<YearEntry>> {
    let mut seen: HashSet<(i32, String, Option<String>)> = HashSet::new();
    let mut grouped: BTreeMap<i32, Vec<YearEntry>> = BTreeMap::new();

    for row in rows {
        if !seen.insert((row.ceremony_year, row.film_title.clone(), row.category.clone())) {
            continue;
        }

        let poster_url = row
            .film_poster_url
            .filter(|p| !p.is_empty())
            .or(row.poster_url)
            .filter(|p| !p.is_empty());
        if poster_url.is_none() && row.film_id.is_none() {
            continue;
        }

        grouped.entry(row.ceremony_year).or_default().push(YearEntry {
            movie_id: row.film_id,
            film: row.film_title,
            category: row.category,
            recipient: row.recipient,
            poster_url,
            year: row.ceremony_year,
            winner: row.winner,
        });
    }

    grouped
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TopWinner {
    pub name: String,
    pub wins: i64,
}

/// Actors with the most wins, ties in name order.
pub async fn top_winners<C>(conn: &C) -> Result<Vec<TopWinner>, DbErr>
where
    C: ConnectionTrait,
{
    let rows: Vec<(String, i64)> = award::Entity::find()
        .select_only()
        .column(actor::Column::Name)
        .column_as(award::Column::Id.count(), "wins")
        .join(JoinType::InnerJoin, award::Relation::Actor.def())
        .filter(award::Column::Winner.eq(true))
        .group_by(actor::Column::Name)
        .order_by_desc(award::Column::Id.count())
        .order_by_asc(actor::Column::Name)
        .limit(TOP_WINNERS_LIMIT)
        .into_tuple()
        .all(conn)
        .await?;

    Ok(rows.into_iter().map(|(name, wins)| TopWinner { name, wins }).collect())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct YearTally {
    pub year: i32,
    pub wins: i64,
    pub nominations: i64,
}

/// Wins and non-winning nominations per ceremony year, oldest first.
pub async fn wins_vs_nominations<C>(conn: &C) -> Result<Vec<YearTally>, DbErr>
where
    C: ConnectionTrait,
{
    let rows: Vec<(i32, bool, i64)> = award::Entity::find()
        .select_only()
        .column(award::Column::CeremonyYear)
        .column(award::Column::Winner)
        .column_as(award::Column::Id.count(), "total")
        .group_by(award::Column::CeremonyYear)
        .group_by(award::Column::Winner)
        .into_tuple()
        .all(conn)
        .await?;

    let mut tallies: BTreeMap<i32, YearTally> = BTreeMap::new();
    for (year, winner, count) in rows {
        let tally = tallies.entry(year).or_insert(YearTally { year, wins: 0, nominations: 0 });
        if winner {
            tally.wins += count;
        } else {
            tally.nominations += count;
        }
    }
    Ok(tallies.into_values().collect())
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AwardedFilm {
    /// External catalog id of the matching film, when there is one.
    pub id: Option<i32>,
    pub title: String,
    pub poster_url: Option<String>,
    pub release_date: Option<String>,
    pub wins: i64,
}

pub async fn most_awarded_films<C>(conn: &C) -> Result<Vec<AwardedFilm>, DbErr>
where
    C: ConnectionTrait,
{
    let rows: Vec<(String, String, i64)> = award::Entity::find()
        .select_only()
        .column(award::Column::FilmKey)
        .column_as(award::Column::FilmTitle.min(), "title")
        .column_as(award::Column::Id.count(), "wins")
        .filter(award::Column::Winner.eq(true))
        .group_by(award::Column::FilmKey)
        .order_by_desc(award::Column::Id.count())
        .order_by_asc(award::Column::FilmKey)
        .limit(MOST_AWARDED_LIMIT)
        .into_tuple()
        .all(conn)
        .await?;

    let mut out = Vec::with_capacity(rows.len());
    for (key, title, wins) in rows {
        let representative = award::Entity::find()
            .filter(award::Column::FilmKey.eq(key.as_str()))
            .filter(award::Column::Winner.eq(true))
            .order_by_asc(award::Column::Id)
            .one(conn)
            .await?;
        let film = matcher::find_exact(conn, &key).await?;

        out.push(AwardedFilm {
            id: film.as_ref().and_then(|f| f.external_id),
            title,
            poster_url: representative.and_then(|a| a.poster_url),
            release_date: film.and_then(|f| f.release_date),
            wins,
        });
    }
    Ok(out)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

/// Award counts per category, most frequent first.
pub async fn categories_frequency<C>(conn: &C) -> Result<Vec<CategoryCount>, DbErr>
where
    C: ConnectionTrait,
{
    let rows: Vec<(Option<String>, i64)> = award::Entity::find()
        .select_only()
        .column(category::Column::Name)
        .column_as(award::Column::Id.count(), "total")
        .join(JoinType::LeftJoin, award::Relation::Category.def())
        .group_by(category::Column::Name)
        .order_by_desc(award::Column::Id.count())
        .order_by_asc(category::Column::Name)
        .into_tuple()
        .all(conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(name, count)| CategoryCount {
            category: name.unwrap_or_else(|| UNKNOWN_CATEGORY.to_string()),
            count,
        })
        .collect())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryWinner {
    pub film: String,
    pub year: i32,
    pub recipients: Vec<String>,
    pub recipient: String,
}

/// Most recent winners in one category, with co-recipients of the same film
/// and year merged into one entry.
pub async fn category_winners<C>(
    conn: &C,
    category_name: &str,
    limit: usize,
) -> Result<Vec<CategoryWinner>, DbErr>
where
    C: ConnectionTrait,
{
    // over-fetch so merged groups can still fill the limit
    let fetch = limit.saturating_mul(5) as u64;
    let rows: Vec<(String, i32, Option<String>)> = award::Entity::find()
        .select_only()
        .column(award::Column::FilmTitle)
        .column(award::Column::CeremonyYear)
        .column_as(actor::Column::Name, "recipient")
        .join(JoinType::InnerJoin, award::Relation::Category.def())
        .join(JoinType::LeftJoin, award::Relation::Actor.def())
        .filter(award::Column::Winner.eq(true))
        .filter(category::Column::Name.eq(category_name))
        .order_by_desc(award::Column::CeremonyYear)
        .order_by_asc(award::Column::Id)
        .limit(fetch)
        .into_tuple()
        .all(conn)
        .await?;

    Ok(merge_recipients(rows, limit))
}

fn merge_recipients(rows: Vec<(String, i32, Option<String>)>, limit: usize) -> Vec<CategoryWinner> {
    let mut index: HashMap<(String, i32), usize> = HashMap::new();
    let mut groups: Vec<(String, i32, Vec<String>)> = Vec::new();

    for (film, year, recipient) in rows {
        let recipient = recipient.unwrap_or_else(|| "—".to_string());
        match index.get(&(film.clone(), year)) {
            Some(&i) => groups[i].2.push(recipient),
            None => {
                index.insert((film.clone(), year), groups.len());
                groups.push((film, year, vec![recipient]));
            },
        }
    }

    groups.sort_by(|a, b| b.1.cmp(&a.1));
    groups
        .into_iter()
        .take(limit)
        .map(|(film, year, recipients)| CategoryWinner {
            recipient: recipients.join(", "),
            film,
            year,
            recipients,
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Treasure {
    pub id: i32,
    pub title: String,
    pub overview: Option<String>,
    pub poster_url: Option<String>,
    pub release_date: Option<String>,
    pub vote_average: Option<f64>,
    pub recommend_count: i32,
}

/// Highly rated films that never appear in the award ledger.
pub async fn underrated_treasures<C>(conn: &C) -> Result<Vec<Treasure>, DbErr>
where
    C: ConnectionTrait,
{
    let awarded = award::Entity::find()
        .select_only()
        .column(award::Column::FilmKey)
        .distinct()
        .into_query();

    let films = film::Entity::find()
        .filter(film::Column::VoteAverage.gte(UNDERRATED_MIN_RATING))
        .filter(film::Column::TitleKey.not_in_subquery(awarded))
        .order_by_desc(film::Column::VoteAverage)
        .order_by_asc(film::Column::Id)
        .all(conn)
        .await?;

    Ok(films
        .into_iter()
        .map(|f| Treasure {
            id: f.id,
            title: f.title,
            overview: f.overview,
            poster_url: f.poster_url,
            release_date: f.release_date,
            vote_average: f.vote_average,
            recommend_count: f.recommend_count,
        })
        .collect())
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilmAward {
    pub category: Option<String>,
    pub recipient: Option<String>,
    pub year: i32,
    pub winner: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilmDetails {
    #[serde(flatten)]
    pub film: film::Model,
    pub awards: Vec<FilmAward>,
}

/// Looks a film up by id, or by title through the matcher when no id is
/// given, together with every award linked to it or filed under its title.
pub async fn film_details<C>(
    conn: &C,
    movie_id: Option<i32>,
    title: Option<&str>,
) -> Result<Option<FilmDetails>, DbErr>
where
    C: ConnectionTrait,
{
    let found = match (movie_id, title) {
        (Some(id), _) => film::Entity::find_by_id(id).one(conn).await?,
        (None, Some(title)) => matcher::match_title(conn, title).await?,
        (None, None) => None,
    };
    let Some(film) = found else {
        return Ok(None);
    };

    let awards = award::Entity::find()
        .select_only()
        .column_as(category::Column::Name, "category")
        .column_as(actor::Column::Name, "recipient")
        .column_as(award::Column::CeremonyYear, "year")
        .column(award::Column::Winner)
        .join(JoinType::LeftJoin, award::Relation::Category.def())
        .join(JoinType::LeftJoin, award::Relation::Actor.def())
        .filter(
            award::Column::FilmId
                .eq(film.id)
                .or(award::Column::FilmKey.eq(film.title_key.as_str())),
        )
        .order_by_desc(award::Column::CeremonyYear)
        .order_by_asc(award::Column::Id)
        .into_tuple::<(Option<String>, Option<String>, i32, bool)>()
        .all(conn)
        .await?
        .into_iter()
        .map(|(category, recipient, year, winner)| FilmAward { category, recipient, year, winner })
        .collect();

    Ok(Some(FilmDetails { film, awards }))
}
