pub const SCHEMA: &str = r#"
-- Users: primary key is an externally issued identifier
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    is_admin INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Groups of travellers
CREATE TABLE IF NOT EXISTS trip_groups (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Group membership; rows vanish with either side
CREATE TABLE IF NOT EXISTS user_groups (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    group_id INTEGER NOT NULL,
    is_confirmed INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (user_id, group_id),
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (group_id) REFERENCES trip_groups(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_user_groups_group ON user_groups(group_id);

-- Trips belong to a group
CREATE TABLE IF NOT EXISTS trips (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    group_id INTEGER NOT NULL,
    place TEXT NOT NULL,
    departing_date TEXT NOT NULL,  -- YYYY-MM-DD
    arriving_date TEXT NOT NULL,   -- YYYY-MM-DD
    thumbnail TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (group_id) REFERENCES trip_groups(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_trips_group ON trips(group_id);

-- Photos: file_key names the object in the storage bucket
CREATE TABLE IF NOT EXISTS photos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_key TEXT NOT NULL UNIQUE,
    file_name TEXT NOT NULL DEFAULT '',
    trip_id INTEGER NOT NULL,
    url TEXT NOT NULL,
    taken_at TEXT,
    uploaded_by TEXT,
    is_sorted_yolo INTEGER NOT NULL DEFAULT 0,
    purge_state TEXT NOT NULL DEFAULT 'active',  -- active/pending/remote_deleted
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (trip_id) REFERENCES trips(id) ON DELETE CASCADE,
    FOREIGN KEY (uploaded_by) REFERENCES users(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_photos_trip ON photos(trip_id);
CREATE INDEX IF NOT EXISTS idx_photos_created_at ON photos(created_at);
CREATE INDEX IF NOT EXISTS idx_photos_uploaded_by ON photos(uploaded_by);

-- Object detection labels
CREATE TABLE IF NOT EXISTS tag_yolo (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tag_name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tag_yolo_name ON tag_yolo(tag_name);

-- Face recognition labels, optionally named by a user
CREATE TABLE IF NOT EXISTS tag_face (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tag_num INTEGER NOT NULL,
    custom_name TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS photo_tag_yolo (
    photo_id INTEGER NOT NULL,
    tag_id INTEGER NOT NULL,
    PRIMARY KEY (photo_id, tag_id),
    FOREIGN KEY (photo_id) REFERENCES photos(id) ON DELETE CASCADE,
    FOREIGN KEY (tag_id) REFERENCES tag_yolo(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_photo_tag_yolo_tag ON photo_tag_yolo(tag_id);

CREATE TABLE IF NOT EXISTS photo_tag_face (
    photo_id INTEGER NOT NULL,
    tag_id INTEGER NOT NULL,
    PRIMARY KEY (photo_id, tag_id),
    FOREIGN KEY (photo_id) REFERENCES photos(id) ON DELETE CASCADE,
    FOREIGN KEY (tag_id) REFERENCES tag_face(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_photo_tag_face_tag ON photo_tag_face(tag_id);
"#;

/// Additive migrations for databases created before a column existed.
/// Each statement may fail harmlessly when the column is already present.
pub const MIGRATIONS: &[&str] = &[
    "ALTER TABLE users ADD COLUMN password_hash TEXT",
    "ALTER TABLE photos ADD COLUMN purge_state TEXT NOT NULL DEFAULT 'active'",
    "CREATE INDEX IF NOT EXISTS idx_photos_purge_state ON photos(purge_state)",
];
