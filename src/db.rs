//! Database Upload Module
//!
//! Provides functions to:
//! - Read MySQL settings from the environment
//! - Create the `scholarships` table
//! - Insert CSV rows that are not already stored (matched by title or link)
//!
//! Each CSV file is loaded in its own transaction.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::{debug, error, info, warn};
use serde::Serialize;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::{MySql, Transaction};

use crate::combine::ALL_FILE;
use crate::dates::{clean_date, post_at_for, region_for};
use crate::storage::read_scholarships;
use crate::types::Scholarship;

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS scholarships (
    id INT AUTO_INCREMENT PRIMARY KEY,
    title VARCHAR(500),
    description TEXT,
    link VARCHAR(500),
    official_link VARCHAR(500),
    deadline DATE,
    eligibility TEXT,
    host_country VARCHAR(100),
    host_university VARCHAR(200),
    program_duration VARCHAR(200),
    degree_offered VARCHAR(200),
    region VARCHAR(50),
    post_at DATE,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
    INDEX (title(255)),
    INDEX (link(255)),
    INDEX (region),
    INDEX (post_at)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci
"#;

const INSERT_SQL: &str = r#"
INSERT INTO scholarships (
    title, description, link, official_link, deadline,
    eligibility, host_country, host_university,
    program_duration, degree_offered, region, post_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl DbConfig {
    /// Read `DB_HOST`, `DB_PORT` (default 3306), `DB_USER`, `DB_PASSWORD`
    /// and `DB_DATABASE`.
    pub fn from_env() -> Result<Self> {
        let port = match env::var("DB_PORT") {
            Ok(port) => port
                .parse()
                .with_context(|| format!("DB_PORT is not a valid port: {:?}", port))?,
            Err(_) => 3306,
        };

        Ok(Self {
            host: env::var("DB_HOST").context("DB_HOST environment variable not set")?,
            port,
            user: env::var("DB_USER").context("DB_USER environment variable not set")?,
            password: env::var("DB_PASSWORD").unwrap_or_default(),
            database: env::var("DB_DATABASE").context("DB_DATABASE environment variable not set")?,
        })
    }

    fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
            .charset("utf8mb4")
    }
}

pub async fn connect(config: &DbConfig) -> Result<MySqlPool> {
    MySqlPoolOptions::new()
        .max_connections(5)
        .connect_with(config.connect_options())
        .await
        .with_context(|| format!("Failed to connect to MySQL at {}:{}", config.host, config.port))
}

pub async fn create_table(pool: &MySqlPool) -> Result<()> {
    sqlx::query(CREATE_TABLE_SQL)
        .execute(pool)
        .await
        .context("Failed to create scholarships table")?;
    Ok(())
}

/// Row id of a stored scholarship with the same title or link.
pub async fn scholarship_exists(
    tx: &mut Transaction<'_, MySql>,
    title: &str,
    link: &str,
) -> Result<Option<i32>> {
    let id = sqlx::query_scalar::<_, i32>(
        "SELECT id FROM scholarships WHERE title = ? OR link = ? LIMIT 1",
    )
    .bind(title)
    .bind(link)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(id)
}

/// A CSV row mapped to the `scholarships` columns.
#[derive(Debug, Clone, PartialEq)]
pub struct NewScholarship {
    pub title: String,
    pub description: Option<String>,
    pub link: Option<String>,
    pub official_link: Option<String>,
    pub deadline: Option<NaiveDate>,
    pub eligibility: Option<String>,
    pub host_country: Option<String>,
    pub host_university: Option<String>,
    pub program_duration: Option<String>,
    pub degree_offered: Option<String>,
    pub region: Option<String>,
    pub post_at: NaiveDate,
}

fn nullable(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl NewScholarship {
    /// `None` for rows without a title, which are never stored.
    pub fn from_row(row: &Scholarship, file_name: &str, today: NaiveDate) -> Option<Self> {
        let title = nullable(&row.title)?;
        let deadline = clean_date(&row.deadline);

        Some(Self {
            title,
            description: nullable(&row.description),
            link: nullable(&row.link),
            official_link: nullable(&row.official_link),
            deadline,
            eligibility: nullable(&row.eligibility),
            host_country: nullable(&row.host_country),
            host_university: nullable(&row.host_university),
            program_duration: nullable(&row.program_duration),
            degree_offered: nullable(&row.degree_offered),
            region: region_for(&row.region, file_name),
            post_at: post_at_for(deadline, today),
        })
    }

    async fn insert(&self, tx: &mut Transaction<'_, MySql>) -> Result<()> {
        sqlx::query(INSERT_SQL)
            .bind(&self.title)
            .bind(&self.description)
            .bind(&self.link)
            .bind(&self.official_link)
            .bind(self.deadline)
            .bind(&self.eligibility)
            .bind(&self.host_country)
            .bind(&self.host_university)
            .bind(&self.program_duration)
            .bind(&self.degree_offered)
            .bind(&self.region)
            .bind(self.post_at)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UploadStats {
    pub files: usize,
    pub rows: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl UploadStats {
    pub fn add(&mut self, other: UploadStats) {
        self.files += other.files;
        self.rows += other.rows;
        self.inserted += other.inserted;
        self.skipped += other.skipped;
        self.errors += other.errors;
    }
}

fn preview(title: &str) -> String {
    title.chars().take(50).collect()
}

/// Insert the new rows of one CSV file, committing once at the end.
///
/// An unreadable file counts as one error; a failing row is counted and
/// the rest of the file still loads.
pub async fn process_csv_file(pool: &MySqlPool, path: &Path, today: NaiveDate) -> Result<UploadStats> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    println!("\n📄 Processing: {}", file_name);

    let mut stats = UploadStats {
        files: 1,
        ..Default::default()
    };

    let rows = match read_scholarships(path) {
        Ok(rows) => rows,
        Err(e) => {
            error!("Error processing file {:?}: {:#}", path, e);
            stats.errors += 1;
            return Ok(stats);
        }
    };

    let mut tx = pool.begin().await.context("Failed to start transaction")?;

    for (index, row) in rows.iter().enumerate() {
        stats.rows += 1;

        let Some(record) = NewScholarship::from_row(row, &file_name, today) else {
            warn!("Skipped row {} (no title)", index + 1);
            stats.skipped += 1;
            continue;
        };

        let link = record.link.as_deref().unwrap_or("");
        match scholarship_exists(&mut tx, &record.title, link).await {
            Ok(Some(id)) => {
                debug!("Existing record found (id: {}): {}", id, preview(&record.title));
                stats.skipped += 1;
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                error!("Error checking row {}: {:#}", index + 1, e);
                stats.errors += 1;
                continue;
            }
        }

        match record.insert(&mut tx).await {
            Ok(()) => {
                info!("Inserted: {} (post_at {})", preview(&record.title), record.post_at);
                stats.inserted += 1;
            }
            Err(e) => {
                error!("Error inserting row {}: {:#}", index + 1, e);
                stats.errors += 1;
            }
        }
    }

    tx.commit()
        .await
        .with_context(|| format!("Failed to commit rows from {:?}", path))?;

    Ok(stats)
}

fn csv_files_in(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().map_or(false, |ext| ext == "csv"))
            .collect(),
        Err(_) => Vec::new(),
    };
    files.sort();
    files
}

/// Files to upload: the combined master file when present, else every CSV
/// in `data_dir`, else every CSV in `fallback_dir`.
pub fn find_upload_files(data_dir: &Path, fallback_dir: &Path) -> Vec<PathBuf> {
    let master = data_dir.join(ALL_FILE);
    if master.exists() {
        println!("📦 Found master data file: {}", master.display());
        return vec![master];
    }

    let files = csv_files_in(data_dir);
    if !files.is_empty() {
        return files;
    }

    csv_files_in(fallback_dir)
}

/// Upload every file found by [`find_upload_files`].
pub async fn upload(config: &DbConfig, data_dir: &Path, fallback_dir: &Path) -> Result<UploadStats> {
    println!("🔌 Connecting to MySQL database...");
    let pool = connect(config).await?;

    println!("🏗️ Setting up database table...");
    create_table(&pool).await?;

    let files = find_upload_files(data_dir, fallback_dir);
    println!("🔍 Found {} CSV files to process", files.len());
    if files.is_empty() {
        warn!("No CSV files found, run the scraper first");
    }

    let today = chrono::Local::now().date_naive();
    let mut totals = UploadStats::default();
    for file in &files {
        totals.add(process_csv_file(&pool, file, today).await?);
    }

    pool.close().await;
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_new_scholarship_from_row() {
        let row = Scholarship {
            title: "Chevening Scholarships 2026".to_string(),
            link: "https://opportunitiescorners.com/chevening/".to_string(),
            deadline: "Deadline: 7 October 2025 Apply Now".to_string(),
            host_country: "United Kingdom".to_string(),
            ..Default::default()
        };

        let record = NewScholarship::from_row(&row, "scholarships-uk.csv", ymd(2025, 11, 1)).unwrap();

        assert_eq!(record.deadline, Some(ymd(2025, 10, 7)));
        assert_eq!(record.post_at, ymd(2025, 9, 7));
        assert_eq!(record.region.as_deref(), Some("Uk"));
        assert_eq!(record.description, None);
        assert_eq!(record.host_country.as_deref(), Some("United Kingdom"));
    }

    #[test]
    fn test_new_scholarship_requires_title() {
        let row = Scholarship {
            title: "   ".to_string(),
            link: "https://example.com".to_string(),
            ..Default::default()
        };
        assert_eq!(NewScholarship::from_row(&row, "x.csv", ymd(2025, 1, 1)), None);
    }

    #[test]
    fn test_upload_stats_add() {
        let mut totals = UploadStats::default();
        totals.add(UploadStats { files: 1, rows: 3, inserted: 2, skipped: 1, errors: 0 });
        totals.add(UploadStats { files: 1, rows: 0, inserted: 0, skipped: 0, errors: 1 });
        assert_eq!(totals, UploadStats { files: 2, rows: 3, inserted: 2, skipped: 1, errors: 1 });
    }

    #[test]
    fn test_find_upload_files_prefers_master() {
        let dir = tempdir().unwrap();
        let data = dir.path().join("scholarship_data");
        fs::create_dir_all(&data).unwrap();
        fs::write(data.join("scholarships-uk.csv"), "Title\nA\n").unwrap();
        fs::write(data.join(ALL_FILE), "Title\nA\n").unwrap();

        assert_eq!(find_upload_files(&data, dir.path()), vec![data.join(ALL_FILE)]);
    }

    #[test]
    fn test_find_upload_files_fallbacks() {
        let dir = tempdir().unwrap();
        let data = dir.path().join("scholarship_data");
        fs::create_dir_all(&data).unwrap();
        fs::write(data.join("scholarships-uk.csv"), "Title\nA\n").unwrap();
        fs::write(data.join("scholarships-africa.csv"), "Title\nB\n").unwrap();
        fs::write(data.join("readme.txt"), "").unwrap();

        assert_eq!(
            find_upload_files(&data, dir.path()),
            vec![data.join("scholarships-africa.csv"), data.join("scholarships-uk.csv")]
        );

        let empty = dir.path().join("empty");
        fs::create_dir_all(&empty).unwrap();
        fs::write(dir.path().join("local.csv"), "Title\nC\n").unwrap();
        assert_eq!(find_upload_files(&empty, dir.path()), vec![dir.path().join("local.csv")]);
    }
}
