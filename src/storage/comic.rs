//! Comic entity and its SQL.
//!
//! All functions take a borrowed connection and run on the session thread.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// Lowest comic number that exists.
pub const MIN_COMIC_NUMBER: i64 = 1;

const COLUMNS: &str = "number, name, title_text, transcript, image_url, explanation, loading";

/// A single comic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comic {
    pub number: i64,
    pub name: String,
    pub title_text: Option<String>,
    pub transcript: Option<String>,
    pub image_url: Option<String>,
    pub explanation: Option<String>,
    #[serde(default)]
    pub loading: bool,
}

impl Comic {
    /// A comic with only its number and name set.
    pub fn new(number: i64, name: impl Into<String>) -> Self {
        Self {
            number,
            name: name.into(),
            title_text: None,
            transcript: None,
            image_url: None,
            explanation: None,
            loading: false,
        }
    }

    /// Public page for this comic.
    pub fn website_url(&self) -> String {
        format!("https://xkcd.com/{}/", self.number)
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            number: row.get(0)?,
            name: row.get(1)?,
            title_text: row.get(2)?,
            transcript: row.get(3)?,
            image_url: row.get(4)?,
            explanation: row.get(5)?,
            loading: row.get(6)?,
        })
    }
}

/// The xkcd `info.0.json` document.
#[derive(Debug, Clone, Deserialize)]
pub struct ComicInfo {
    pub num: i64,
    pub safe_title: String,
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub img: Option<String>,
}

impl From<ComicInfo> for Comic {
    fn from(info: ComicInfo) -> Self {
        Self {
            number: info.num,
            name: info.safe_title,
            title_text: info.alt.filter(|s| !s.is_empty()),
            transcript: info.transcript.filter(|s| !s.is_empty()),
            image_url: info.img.filter(|s| !s.is_empty()),
            explanation: None,
            loading: false,
        }
    }
}

/// Insert or replace a comic. Returns the number of rows changed.
pub fn upsert(conn: &Connection, comic: &Comic) -> rusqlite::Result<usize> {
    conn.execute(
        &format!(
            "INSERT INTO comics ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(number) DO UPDATE SET
                name = excluded.name,
                title_text = excluded.title_text,
                transcript = excluded.transcript,
                image_url = excluded.image_url,
                explanation = excluded.explanation,
                loading = excluded.loading"
        ),
        params![
            comic.number,
            comic.name,
            comic.title_text,
            comic.transcript,
            comic.image_url,
            comic.explanation,
            comic.loading,
        ],
    )
}

pub fn get(conn: &Connection, number: i64) -> rusqlite::Result<Option<Comic>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM comics WHERE number = ?1"),
        [number],
        Comic::from_row,
    )
    .optional()
}

/// Highest numbered comic that has been stored.
pub fn last_known(conn: &Connection) -> rusqlite::Result<Option<Comic>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM comics ORDER BY number DESC LIMIT 1"),
        [],
        Comic::from_row,
    )
    .optional()
}

/// Every comic, ascending by number.
pub fn all(conn: &Connection) -> rusqlite::Result<Vec<Comic>> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM comics ORDER BY number ASC"))?;
    let rows = stmt
        .query_map([], Comic::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Comics with no image URL recorded yet, ascending by number.
pub fn without_image(conn: &Connection) -> rusqlite::Result<Vec<Comic>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM comics WHERE image_url IS NULL ORDER BY number ASC"
    ))?;
    let rows = stmt
        .query_map([], Comic::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM comics", [], |row| row.get(0))
}

/// Set the loading marker. Returns the number of rows changed.
pub fn set_loading(conn: &Connection, number: i64, loading: bool) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE comics SET loading = ?2 WHERE number = ?1 AND loading != ?2",
        params![number, loading],
    )
}

/// Delete every comic. Returns the number of rows deleted.
pub fn delete_all(conn: &Connection) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM comics", [])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::Schema;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        Schema::load().unwrap().apply(&conn).unwrap();
        conn
    }

    #[test]
    fn test_upsert_and_get() {
        let conn = test_conn();
        let mut comic = Comic::new(353, "Python");
        comic.title_text = Some("I wrote 20 short programs in Python yesterday.".into());

        assert_eq!(upsert(&conn, &comic).unwrap(), 1);
        assert_eq!(get(&conn, 353).unwrap(), Some(comic.clone()));

        comic.name = "Python (revised)".into();
        upsert(&conn, &comic).unwrap();
        assert_eq!(get(&conn, 353).unwrap().unwrap().name, "Python (revised)");
        assert_eq!(count(&conn).unwrap(), 1);
    }

    #[test]
    fn test_get_missing_is_none() {
        let conn = test_conn();
        assert_eq!(get(&conn, 1).unwrap(), None);
        assert_eq!(last_known(&conn).unwrap(), None);
    }

    #[test]
    fn test_last_known_is_highest_number() {
        let conn = test_conn();
        for number in [10, 404, 42] {
            upsert(&conn, &Comic::new(number, format!("Comic {number}"))).unwrap();
        }

        assert_eq!(last_known(&conn).unwrap().unwrap().number, 404);
    }

    #[test]
    fn test_all_is_ordered_by_number() {
        let conn = test_conn();
        for number in [3, 1, 2] {
            upsert(&conn, &Comic::new(number, "x")).unwrap();
        }

        let numbers: Vec<i64> = all(&conn).unwrap().into_iter().map(|c| c.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_without_image() {
        let conn = test_conn();
        let mut with_image = Comic::new(1, "Barrel - Part 1");
        with_image.image_url = Some("https://imgs.xkcd.com/comics/barrel_cropped_(1).jpg".into());
        upsert(&conn, &with_image).unwrap();
        upsert(&conn, &Comic::new(2, "Petit Trees (sketch)")).unwrap();

        let missing: Vec<i64> = without_image(&conn)
            .unwrap()
            .into_iter()
            .map(|c| c.number)
            .collect();
        assert_eq!(missing, vec![2]);
    }

    #[test]
    fn test_set_loading_reports_only_real_changes() {
        let conn = test_conn();
        upsert(&conn, &Comic::new(7, "Girl Sleeping")).unwrap();

        assert_eq!(set_loading(&conn, 7, true).unwrap(), 1);
        assert_eq!(set_loading(&conn, 7, true).unwrap(), 0);
        assert_eq!(set_loading(&conn, 8, true).unwrap(), 0);
        assert!(get(&conn, 7).unwrap().unwrap().loading);
    }

    #[test]
    fn test_delete_all() {
        let conn = test_conn();
        upsert(&conn, &Comic::new(1, "a")).unwrap();
        upsert(&conn, &Comic::new(2, "b")).unwrap();

        assert_eq!(delete_all(&conn).unwrap(), 2);
        assert_eq!(count(&conn).unwrap(), 0);
    }

    #[test]
    fn test_number_below_minimum_is_rejected_by_schema() {
        let conn = test_conn();
        assert!(upsert(&conn, &Comic::new(0, "zero")).is_err());
    }

    #[test]
    fn test_comic_info_conversion() {
        let info: ComicInfo = serde_json::from_str(
            r#"{"num": 327, "safe_title": "Exploits of a Mom", "title": "Exploits of a Mom",
                "alt": "Her daughter is named Help I'm trapped in a driver's license factory.",
                "transcript": "", "img": "https://imgs.xkcd.com/comics/exploits_of_a_mom.png"}"#,
        )
        .unwrap();

        let comic = Comic::from(info);
        assert_eq!(comic.number, 327);
        assert_eq!(comic.name, "Exploits of a Mom");
        assert!(comic.title_text.is_some());
        assert_eq!(comic.transcript, None);
        assert_eq!(comic.website_url(), "https://xkcd.com/327/");
    }
}
