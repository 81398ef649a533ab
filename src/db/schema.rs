pub const SCHEMA: &str = r#"
-- Registered accounts
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Image blobs, stored apart from observation rows and referenced by opaque id
CREATE TABLE IF NOT EXISTS images (
    id TEXT PRIMARY KEY,
    uploader_id INTEGER NOT NULL,
    filename TEXT NOT NULL,
    content_type TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    sha256_hash TEXT NOT NULL,
    data BLOB NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY (uploader_id) REFERENCES users(id)
);

-- Observations: one species sighting with its photo and location
CREATE TABLE IF NOT EXISTS observations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    uploader_id INTEGER NOT NULL,
    uploader_username TEXT NOT NULL,  -- denormalized for search/feed
    species TEXT NOT NULL,
    image_id TEXT NOT NULL UNIQUE,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY (uploader_id) REFERENCES users(id),
    FOREIGN KEY (image_id) REFERENCES images(id)
);

CREATE INDEX IF NOT EXISTS idx_observations_uploader ON observations(uploader_id, created_at);
CREATE INDEX IF NOT EXISTS idx_observations_created ON observations(created_at);

-- Encyclopedia cache, one row per normalized species name
CREATE TABLE IF NOT EXISTS encyclopedia (
    species_key TEXT PRIMARY KEY,
    species TEXT NOT NULL,
    summary TEXT NOT NULL,
    cached_at TEXT NOT NULL
);
"#;
