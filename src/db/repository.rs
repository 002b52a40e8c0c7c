use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{
    Analysis, Content, DigestEntry, Link, Message, NewAnalysis, NewContent, NewLink,
    NewUserArticle, Role, Scores, User, UserArticle,
};

use super::schema::SCHEMA;

/// A user_article joined with its link and analysis, as served to the
/// consumer-facing read surface.
#[derive(Debug, Clone)]
pub struct FeedItem {
    pub user_article: UserArticle,
    pub title: String,
    pub url: Option<String>,
    pub hnlink: String,
    pub article_summary: Option<String>,
}

/// A content row awaiting analysis, with its story title for prompting.
#[derive(Debug, Clone)]
pub struct PendingAnalysis {
    pub content: Content,
    pub title: String,
}

/// An analyzed article a user has no personalization record for yet.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub article_id: i64,
    pub categories: Vec<String>,
    pub article_summary: String,
}

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Link operations

    /// Insert a link or, when the hn_id is already known, refresh only the
    /// mutable fields (score, descendants). Returns true when a new row was
    /// inserted.
    pub async fn upsert_link(&self, link: NewLink) -> Result<bool> {
        let inserted = self
            .conn
            .call(move |conn| {
                let existing: Option<i64> = conn
                    .query_row(
                        "SELECT id FROM links WHERE hn_id = ?1",
                        params![link.hn_id],
                        |row| row.get(0),
                    )
                    .optional()?;

                conn.execute(
                    r#"INSERT INTO links (hn_id, title, url, score, time, author, descendants, hnlink)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                       ON CONFLICT(hn_id) DO UPDATE SET
                           score = excluded.score,
                           descendants = excluded.descendants"#,
                    params![
                        link.hn_id,
                        link.title,
                        link.url,
                        link.score,
                        link.time,
                        link.author,
                        link.descendants,
                        link.hnlink,
                    ],
                )?;
                Ok(existing.is_none())
            })
            .await?;
        Ok(inserted)
    }

    pub async fn get_link_by_hn_id(&self, hn_id: i64) -> Result<Option<Link>> {
        let link = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {LINK_COLUMNS} FROM links l WHERE l.hn_id = ?1"
                ))?;
                let link = stmt
                    .query_row(params![hn_id], |row| Ok(link_from_row(row)))
                    .optional()?;
                Ok(link)
            })
            .await?;
        Ok(link)
    }

    /// Links without a contents row that are still within the scrape retry
    /// budget and not marked permanently failed.
    pub async fn links_needing_content(&self, retry_budget: u32) -> Result<Vec<Link>> {
        let links = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    r#"SELECT {LINK_COLUMNS}
                       FROM links l
                       LEFT JOIN contents c ON c.link_id = l.id
                       WHERE c.id IS NULL
                         AND l.scrape_failed = 0
                         AND l.scrape_attempts < ?1
                       ORDER BY l.id"#
                ))?;
                let links = stmt
                    .query_map(params![retry_budget], |row| Ok(link_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(links)
            })
            .await?;
        Ok(links)
    }

    /// Count a failed scrape attempt; once the budget is exhausted the link
    /// is excluded from future runs until a forced retry clears the marker.
    pub async fn record_scrape_failure(&self, link_id: i64, retry_budget: u32) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"UPDATE links
                       SET scrape_attempts = scrape_attempts + 1,
                           scrape_failed = CASE WHEN scrape_attempts + 1 >= ?2 THEN 1 ELSE 0 END
                       WHERE id = ?1"#,
                    params![link_id, retry_budget],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn reset_scrape_failures(&self) -> Result<usize> {
        let count = self
            .conn
            .call(|conn| {
                let count = conn.execute(
                    "UPDATE links SET scrape_attempts = 0, scrape_failed = 0 WHERE scrape_failed = 1 OR scrape_attempts > 0",
                    [],
                )?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }

    // Content operations

    /// Insert a content row. A conflict on link_id is a no-op: existing text
    /// is never overwritten without an explicit refresh. Returns true when
    /// the row was actually inserted.
    pub async fn insert_content(&self, content: NewContent) -> Result<bool> {
        let inserted = self
            .conn
            .call(move |conn| {
                let count = conn.execute(
                    r#"INSERT INTO contents (link_id, article, comments)
                       VALUES (?1, ?2, ?3)
                       ON CONFLICT(link_id) DO NOTHING"#,
                    params![content.link_id, content.article, content.comments],
                )?;
                Ok(count > 0)
            })
            .await?;
        Ok(inserted)
    }

    pub async fn get_content_by_link_id(&self, link_id: i64) -> Result<Option<Content>> {
        let content = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {CONTENT_COLUMNS} FROM contents c WHERE c.link_id = ?1"
                ))?;
                let content = stmt
                    .query_row(params![link_id], |row| Ok(content_from_row(row)))
                    .optional()?;
                Ok(content)
            })
            .await?;
        Ok(content)
    }

    /// Contents without an analysis row, excluding permanent failures.
    pub async fn contents_needing_analysis(&self) -> Result<Vec<PendingAnalysis>> {
        let pending = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    r#"SELECT {CONTENT_COLUMNS}, l.title
                       FROM contents c
                       JOIN links l ON l.id = c.link_id
                       LEFT JOIN analysis a ON a.content_id = c.id
                       WHERE a.id IS NULL
                         AND c.analyze_failed = 0
                       ORDER BY c.id"#
                ))?;
                let pending = stmt
                    .query_map([], |row| {
                        Ok(PendingAnalysis {
                            content: content_from_row(row),
                            title: row.get(6).unwrap(),
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(pending)
            })
            .await?;
        Ok(pending)
    }

    /// Exclude a content row from automatic analysis after its retry budget
    /// ran out. Cleared by a forced refresh.
    pub async fn mark_analyze_failed(&self, content_id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE contents SET analyze_failed = 1 WHERE id = ?1",
                    params![content_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn reset_analyze_failures(&self) -> Result<usize> {
        let count = self
            .conn
            .call(|conn| {
                let count = conn.execute(
                    "UPDATE contents SET analyze_failed = 0 WHERE analyze_failed = 1",
                    [],
                )?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }

    // Analysis operations

    /// Commit a fully validated analysis. A conflict on content_id is a
    /// no-op; analysis is created at most once.
    pub async fn insert_analysis(&self, analysis: NewAnalysis) -> Result<bool> {
        let categories_json = serde_json::to_string(&analysis.categories)?;
        let inserted = self
            .conn
            .call(move |conn| {
                let count = conn.execute(
                    r#"INSERT INTO analysis
                           (content_id, article_summary, comments_summary, categories,
                            relevance, trustworthiness, controversy, model_version)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                       ON CONFLICT(content_id) DO NOTHING"#,
                    params![
                        analysis.content_id,
                        analysis.article_summary,
                        analysis.comments_summary,
                        categories_json,
                        analysis.scores.relevance,
                        analysis.scores.trustworthiness,
                        analysis.scores.controversy,
                        analysis.model_version,
                    ],
                )?;
                Ok(count > 0)
            })
            .await?;
        Ok(inserted)
    }

    /// The analysis for an article (a links id), if the pipeline has
    /// produced one.
    pub async fn get_analysis_for_article(&self, article_id: i64) -> Result<Option<Analysis>> {
        let analysis = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    r#"SELECT {ANALYSIS_COLUMNS}
                       FROM analysis a
                       JOIN contents c ON c.id = a.content_id
                       WHERE c.link_id = ?1"#
                ))?;
                let analysis = stmt
                    .query_row(params![article_id], |row| Ok(analysis_from_row(row)))
                    .optional()?;
                Ok(analysis)
            })
            .await?;
        Ok(analysis)
    }

    // User operations

    pub async fn create_user(
        &self,
        email: String,
        categories: Vec<String>,
        description: String,
    ) -> Result<i64> {
        let categories_json = serde_json::to_string(&categories)?;
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO users (email, categories, description) VALUES (?1, ?2, ?3)",
                    params![email, categories_json, description],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn update_user_preferences(
        &self,
        user_id: i64,
        categories: Vec<String>,
        description: String,
    ) -> Result<()> {
        let categories_json = serde_json::to_string(&categories)?;
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE users SET categories = ?2, description = ?3 WHERE id = ?1",
                    params![user_id, categories_json, description],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        let user = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {USER_COLUMNS} FROM users WHERE id = ?1"
                ))?;
                let user = stmt
                    .query_row(params![user_id], |row| Ok(user_from_row(row)))
                    .optional()?;
                Ok(user)
            })
            .await?;
        Ok(user)
    }

    pub async fn active_users(&self) -> Result<Vec<User>> {
        let users = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {USER_COLUMNS} FROM users WHERE is_active = 1 ORDER BY id"
                ))?;
                let users = stmt
                    .query_map([], |row| Ok(user_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(users)
            })
            .await?;
        Ok(users)
    }

    // Matching operations

    /// Analyzed articles the user has no user_articles row for yet.
    pub async fn match_candidates(&self, user_id: i64) -> Result<Vec<MatchCandidate>> {
        let candidates = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT l.id, a.categories, a.article_summary
                       FROM links l
                       JOIN contents c ON c.link_id = l.id
                       JOIN analysis a ON a.content_id = c.id
                       LEFT JOIN user_articles ua
                           ON ua.article_id = l.id AND ua.user_id = ?1
                       WHERE ua.id IS NULL
                       ORDER BY l.id"#,
                )?;
                let candidates = stmt
                    .query_map(params![user_id], |row| {
                        Ok(MatchCandidate {
                            article_id: row.get(0).unwrap(),
                            categories: parse_slug_list(row.get::<_, String>(1).unwrap()),
                            article_summary: row.get(2).unwrap(),
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(candidates)
            })
            .await?;
        Ok(candidates)
    }

    /// Insert a personalization record. A conflict on (user_id, article_id)
    /// is a no-op; matching never rewrites an existing pair.
    pub async fn insert_user_article(&self, record: NewUserArticle) -> Result<bool> {
        let matched_json = serde_json::to_string(&record.matched_categories)?;
        let inserted = self
            .conn
            .call(move |conn| {
                let count = conn.execute(
                    r#"INSERT INTO user_articles (user_id, article_id, matched_categories, relevance_score)
                       VALUES (?1, ?2, ?3, ?4)
                       ON CONFLICT(user_id, article_id) DO NOTHING"#,
                    params![
                        record.user_id,
                        record.article_id,
                        matched_json,
                        record.relevance_score,
                    ],
                )?;
                Ok(count > 0)
            })
            .await?;
        Ok(inserted)
    }

    pub async fn get_user_article(
        &self,
        user_id: i64,
        article_id: i64,
    ) -> Result<Option<UserArticle>> {
        let record = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {USER_ARTICLE_COLUMNS} FROM user_articles ua WHERE ua.user_id = ?1 AND ua.article_id = ?2"
                ))?;
                let record = stmt
                    .query_row(params![user_id, article_id], |row| {
                        Ok(user_article_from_row(row))
                    })
                    .optional()?;
                Ok(record)
            })
            .await?;
        Ok(record)
    }

    pub async fn mark_read(&self, user_article_id: i64, is_read: bool) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE user_articles SET is_read = ?2 WHERE id = ?1",
                    params![user_article_id, is_read],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Digest operations

    /// A user's unsent records at or above the relevance threshold, best
    /// first, capped at `limit`.
    pub async fn digest_candidates(
        &self,
        user_id: i64,
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<DigestEntry>> {
        let entries = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT ua.id, l.id, l.title, l.url, l.hnlink,
                              a.article_summary, ua.matched_categories, ua.relevance_score
                       FROM user_articles ua
                       JOIN links l ON l.id = ua.article_id
                       JOIN contents c ON c.link_id = l.id
                       JOIN analysis a ON a.content_id = c.id
                       WHERE ua.user_id = ?1
                         AND ua.is_sent = 0
                         AND ua.relevance_score >= ?2
                       ORDER BY ua.relevance_score DESC
                       LIMIT ?3"#,
                )?;
                let entries = stmt
                    .query_map(params![user_id, threshold, limit as i64], |row| {
                        Ok(DigestEntry {
                            user_article_id: row.get(0).unwrap(),
                            article_id: row.get(1).unwrap(),
                            title: row.get(2).unwrap(),
                            url: row.get(3).unwrap(),
                            hnlink: row.get(4).unwrap(),
                            article_summary: row.get(5).unwrap(),
                            matched_categories: parse_slug_list(row.get::<_, String>(6).unwrap()),
                            relevance_score: row.get(7).unwrap(),
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await?;
        Ok(entries)
    }

    /// Flip `is_sent` on exactly the given rows in one statement. Called
    /// only after the mailer confirmed delivery.
    pub async fn mark_sent(&self, user_article_ids: Vec<i64>) -> Result<()> {
        if user_article_ids.is_empty() {
            return Ok(());
        }
        self.conn
            .call(move |conn| {
                let placeholders = vec!["?"; user_article_ids.len()].join(",");
                let sql = format!(
                    "UPDATE user_articles SET is_sent = 1 WHERE id IN ({placeholders})"
                );
                conn.execute(&sql, rusqlite::params_from_iter(user_article_ids))?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Read surface

    /// A user's personalized feed: user_articles joined with links and
    /// analysis, most relevant first.
    pub async fn personalized_feed(&self, user_id: i64, unread_only: bool) -> Result<Vec<FeedItem>> {
        let items = self
            .conn
            .call(move |conn| {
                let mut sql = format!(
                    r#"SELECT {USER_ARTICLE_COLUMNS}, l.title, l.url, l.hnlink, a.article_summary
                       FROM user_articles ua
                       JOIN links l ON l.id = ua.article_id
                       LEFT JOIN contents c ON c.link_id = l.id
                       LEFT JOIN analysis a ON a.content_id = c.id
                       WHERE ua.user_id = ?1"#
                );
                if unread_only {
                    sql.push_str(" AND ua.is_read = 0");
                }
                sql.push_str(" ORDER BY ua.relevance_score DESC, ua.id");

                let mut stmt = conn.prepare(&sql)?;
                let items = stmt
                    .query_map(params![user_id], |row| {
                        Ok(FeedItem {
                            user_article: user_article_from_row(row),
                            title: row.get(8).unwrap(),
                            url: row.get(9).unwrap(),
                            hnlink: row.get(10).unwrap(),
                            article_summary: row.get(11).unwrap(),
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(items)
            })
            .await?;
        Ok(items)
    }

    // Message operations

    pub async fn messages_for(&self, user_article_id: i64) -> Result<Vec<Message>> {
        let messages = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id, user_article_id, role, content, created_at
                       FROM messages
                       WHERE user_article_id = ?1
                       ORDER BY created_at, id"#,
                )?;
                let messages = stmt
                    .query_map(params![user_article_id], |row| Ok(message_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(messages)
            })
            .await?;
        Ok(messages)
    }

    /// Append a message with a timestamp strictly greater than every message
    /// already in this conversation, even when the wall clock has not moved.
    pub async fn append_message(
        &self,
        user_article_id: i64,
        role: Role,
        content: String,
    ) -> Result<Message> {
        let now_ms = Utc::now().timestamp_millis();
        let message = self
            .conn
            .call(move |conn| {
                let last_ms: Option<i64> = conn
                    .query_row(
                        "SELECT MAX(created_at) FROM messages WHERE user_article_id = ?1",
                        params![user_article_id],
                        |row| row.get(0),
                    )
                    .optional()?
                    .flatten();

                let created_at = match last_ms {
                    Some(last) => now_ms.max(last + 1),
                    None => now_ms,
                };

                conn.execute(
                    "INSERT INTO messages (user_article_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![user_article_id, role.as_str(), content, created_at],
                )?;
                let id = conn.last_insert_rowid();

                Ok(Message {
                    id,
                    user_article_id,
                    role,
                    content,
                    created_at,
                })
            })
            .await?;
        Ok(message)
    }
}

const LINK_COLUMNS: &str = "l.id, l.hn_id, l.title, l.url, l.score, l.time, l.author, \
                            l.descendants, l.hnlink, l.scrape_attempts, l.scrape_failed, l.created_at";
const CONTENT_COLUMNS: &str =
    "c.id, c.link_id, c.article, c.comments, c.analyze_failed, c.created_at";
const ANALYSIS_COLUMNS: &str = "a.id, a.content_id, a.article_summary, a.comments_summary, \
                                a.categories, a.relevance, a.trustworthiness, a.controversy, \
                                a.model_version, a.created_at";
const USER_COLUMNS: &str = "id, email, is_active, categories, description, created_at";
const USER_ARTICLE_COLUMNS: &str = "ua.id, ua.user_id, ua.article_id, ua.matched_categories, \
                                    ua.relevance_score, ua.is_read, ua.is_sent, ua.created_at";

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn datetime_at(row: &Row, idx: usize) -> DateTime<Utc> {
    row.get::<_, String>(idx)
        .ok()
        .and_then(|s| parse_datetime(&s))
        .unwrap_or_else(Utc::now)
}

fn parse_slug_list(json: String) -> Vec<String> {
    serde_json::from_str(&json).unwrap_or_default()
}

fn link_from_row(row: &Row) -> Link {
    Link {
        id: row.get(0).unwrap(),
        hn_id: row.get(1).unwrap(),
        title: row.get(2).unwrap(),
        url: row.get(3).unwrap(),
        score: row.get(4).unwrap(),
        time: row.get(5).unwrap(),
        author: row.get(6).unwrap(),
        descendants: row.get(7).unwrap(),
        hnlink: row.get(8).unwrap(),
        scrape_attempts: row.get(9).unwrap(),
        scrape_failed: row.get::<_, i64>(10).unwrap() != 0,
        created_at: datetime_at(row, 11),
    }
}

fn content_from_row(row: &Row) -> Content {
    Content {
        id: row.get(0).unwrap(),
        link_id: row.get(1).unwrap(),
        article: row.get(2).unwrap(),
        comments: row.get(3).unwrap(),
        analyze_failed: row.get::<_, i64>(4).unwrap() != 0,
        created_at: datetime_at(row, 5),
    }
}

fn analysis_from_row(row: &Row) -> Analysis {
    Analysis {
        id: row.get(0).unwrap(),
        content_id: row.get(1).unwrap(),
        article_summary: row.get(2).unwrap(),
        comments_summary: row.get(3).unwrap(),
        categories: parse_slug_list(row.get::<_, String>(4).unwrap()),
        scores: Scores {
            relevance: row.get(5).unwrap(),
            trustworthiness: row.get(6).unwrap(),
            controversy: row.get(7).unwrap(),
        },
        model_version: row.get(8).unwrap(),
        created_at: datetime_at(row, 9),
    }
}

fn user_from_row(row: &Row) -> User {
    User {
        id: row.get(0).unwrap(),
        email: row.get(1).unwrap(),
        is_active: row.get::<_, i64>(2).unwrap() != 0,
        categories: parse_slug_list(row.get::<_, String>(3).unwrap()),
        description: row.get(4).unwrap(),
        created_at: datetime_at(row, 5),
    }
}

fn user_article_from_row(row: &Row) -> UserArticle {
    UserArticle {
        id: row.get(0).unwrap(),
        user_id: row.get(1).unwrap(),
        article_id: row.get(2).unwrap(),
        matched_categories: parse_slug_list(row.get::<_, String>(3).unwrap()),
        relevance_score: row.get(4).unwrap(),
        is_read: row.get::<_, i64>(5).unwrap() != 0,
        is_sent: row.get::<_, i64>(6).unwrap() != 0,
        created_at: datetime_at(row, 7),
    }
}

fn message_from_row(row: &Row) -> Message {
    Message {
        id: row.get(0).unwrap(),
        user_article_id: row.get(1).unwrap(),
        role: Role::parse(&row.get::<_, String>(2).unwrap()).unwrap_or(Role::User),
        content: row.get(3).unwrap(),
        created_at: row.get(4).unwrap(),
    }
}
