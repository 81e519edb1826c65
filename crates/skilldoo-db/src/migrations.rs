use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                email           TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password        TEXT NOT NULL,
                name            TEXT,
                location        TEXT,
                avatar_url      TEXT,
                availability    TEXT,
                is_public       INTEGER NOT NULL DEFAULT 1,
                is_active       INTEGER NOT NULL DEFAULT 1,
                role            TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin')),
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE TABLE skills (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                name_key    TEXT NOT NULL UNIQUE,
                category    TEXT NOT NULL DEFAULT 'General',
                description TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_skills_category ON skills(category);

            CREATE TABLE user_skills (
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                skill_id    TEXT NOT NULL REFERENCES skills(id) ON DELETE CASCADE,
                kind        TEXT NOT NULL CHECK (kind IN ('offered', 'wanted')),
                proficiency TEXT,
                PRIMARY KEY (user_id, skill_id, kind)
            );

            CREATE INDEX idx_user_skills_skill ON user_skills(skill_id);

            CREATE TABLE swap_requests (
                id               TEXT PRIMARY KEY,
                requester_id     TEXT NOT NULL REFERENCES users(id),
                provider_id      TEXT NOT NULL REFERENCES users(id),
                offered_skill_id TEXT NOT NULL REFERENCES skills(id),
                wanted_skill_id  TEXT NOT NULL REFERENCES skills(id),
                status           TEXT NOT NULL DEFAULT 'pending'
                                 CHECK (status IN ('pending', 'accepted', 'rejected', 'completed')),
                message          TEXT,
                created_at       TEXT NOT NULL,
                updated_at       TEXT NOT NULL,
                completed_at     TEXT,
                CHECK (requester_id <> provider_id)
            );

            -- At most one open request per ordered pair
            CREATE UNIQUE INDEX idx_swap_requests_one_pending
                ON swap_requests(requester_id, provider_id) WHERE status = 'pending';
            CREATE INDEX idx_swap_requests_requester ON swap_requests(requester_id, created_at);
            CREATE INDEX idx_swap_requests_provider ON swap_requests(provider_id, created_at);

            CREATE TABLE ratings (
                id              TEXT PRIMARY KEY,
                swap_request_id TEXT NOT NULL REFERENCES swap_requests(id) ON DELETE CASCADE,
                from_user_id    TEXT NOT NULL REFERENCES users(id),
                to_user_id      TEXT NOT NULL REFERENCES users(id),
                rating          INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
                feedback        TEXT,
                created_at      TEXT NOT NULL,
                UNIQUE (swap_request_id, from_user_id)
            );

            CREATE INDEX idx_ratings_to_user ON ratings(to_user_id, created_at);

            CREATE TABLE platform_messages (
                id          TEXT PRIMARY KEY,
                title       TEXT NOT NULL,
                content     TEXT NOT NULL,
                kind        TEXT NOT NULL DEFAULT 'info'
                            CHECK (kind IN ('info', 'warning', 'announcement', 'maintenance')),
                author_id   TEXT NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL
            );

            CREATE TABLE user_messages (
                user_id             TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                platform_message_id TEXT NOT NULL REFERENCES platform_messages(id) ON DELETE CASCADE,
                is_read             INTEGER NOT NULL DEFAULT 0,
                read_at             TEXT,
                PRIMARY KEY (user_id, platform_message_id)
            );

            CREATE INDEX idx_user_messages_message ON user_messages(platform_message_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
