pub const SCHEMA: &str = r#"
-- links table: one row per ingested story
CREATE TABLE IF NOT EXISTS links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    hn_id INTEGER NOT NULL UNIQUE,
    title TEXT NOT NULL,
    url TEXT,
    score INTEGER NOT NULL DEFAULT 0,
    time INTEGER NOT NULL DEFAULT 0,
    author TEXT,
    descendants INTEGER NOT NULL DEFAULT 0,
    hnlink TEXT NOT NULL,
    scrape_attempts INTEGER NOT NULL DEFAULT 0,
    scrape_failed INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_links_hn_id ON links(hn_id);

-- contents table: scraped article + flattened comments, committed together
CREATE TABLE IF NOT EXISTS contents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    link_id INTEGER NOT NULL UNIQUE REFERENCES links(id) ON DELETE CASCADE,
    article TEXT NOT NULL,
    comments TEXT NOT NULL,
    analyze_failed INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- analysis table: AI summaries, categories and scores
CREATE TABLE IF NOT EXISTS analysis (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content_id INTEGER NOT NULL UNIQUE REFERENCES contents(id) ON DELETE CASCADE,
    article_summary TEXT NOT NULL,
    comments_summary TEXT NOT NULL,
    categories TEXT NOT NULL DEFAULT '[]',
    relevance REAL NOT NULL,
    trustworthiness REAL NOT NULL,
    controversy REAL NOT NULL,
    model_version TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- users table
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    is_active INTEGER NOT NULL DEFAULT 1,
    categories TEXT NOT NULL DEFAULT '[]',
    description TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- user_articles table: the personalization join record
CREATE TABLE IF NOT EXISTS user_articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    article_id INTEGER NOT NULL REFERENCES links(id) ON DELETE CASCADE,
    matched_categories TEXT NOT NULL DEFAULT '[]',
    relevance_score REAL NOT NULL DEFAULT 0,
    is_read INTEGER NOT NULL DEFAULT 0,
    is_sent INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(user_id, article_id)
);

CREATE INDEX IF NOT EXISTS idx_user_articles_user_id ON user_articles(user_id);
CREATE INDEX IF NOT EXISTS idx_user_articles_unsent ON user_articles(user_id, is_sent);

-- messages table: append-only chat history, millisecond timestamps
CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_article_id INTEGER NOT NULL REFERENCES user_articles(id) ON DELETE CASCADE,
    role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
    content TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_user_article ON messages(user_article_id, created_at);
"#;
