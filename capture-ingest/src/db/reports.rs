//! Report table queries

use capture_common::{time, Error, Result};
use sqlx::{Row, SqliteConnection};

use crate::models::{ArtifactKind, Pair, Report, Score, SessionKey, TickId};

/// Row id of the report for `key`, if one exists
pub async fn find_report_id(conn: &mut SqliteConnection, key: &SessionKey) -> Result<Option<i64>> {
    let id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM reports WHERE child_name = ? AND session_id = ?",
    )
    .bind(&key.child_name)
    .bind(&key.session_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(id)
}

/// Create the report for `key` if absent and return its row id
pub async fn ensure_report(conn: &mut SqliteConnection, key: &SessionKey) -> Result<i64> {
    let now = time::now_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO reports (child_name, session_id, created_at, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (child_name, session_id) DO NOTHING
        "#,
    )
    .bind(&key.child_name)
    .bind(&key.session_id)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    find_report_id(conn, key)
        .await?
        .ok_or_else(|| Error::Internal(format!("Report for {} vanished after insert", key)))
}

/// Bump `updated_at` after a mutation
pub async fn touch_report(conn: &mut SqliteConnection, report_id: i64) -> Result<()> {
    sqlx::query("UPDATE reports SET updated_at = ? WHERE id = ?")
        .bind(time::now_rfc3339())
        .bind(report_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Load the full report for `key`
pub async fn load_report(conn: &mut SqliteConnection, key: &SessionKey) -> Result<Option<Report>> {
    let report_id = match find_report_id(conn, key).await? {
        Some(id) => id,
        None => return Ok(None),
    };

    let pair_rows = sqlx::query(
        r#"
        SELECT tick_id, img_path, screenshot_path, emotions
        FROM report_pairs
        WHERE report_id = ?
        ORDER BY id ASC
        "#,
    )
    .bind(report_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut pairs = Vec::with_capacity(pair_rows.len());
    for row in pair_rows {
        let emotions: Option<String> = row.get("emotions");
        let emotions = emotions
            .map(|text| serde_json::from_str(&text))
            .transpose()
            .map_err(|e| Error::Internal(format!("Failed to deserialize emotions: {}", e)))?;

        pairs.push(Pair {
            tick: TickId::from(row.get::<String, _>("tick_id")),
            img_path: row.get("img_path"),
            screenshot_path: row.get("screenshot_path"),
            emotions,
        });
    }

    let scores = sqlx::query_as::<_, (String, f64)>(
        "SELECT game_type, score FROM report_scores WHERE report_id = ? ORDER BY id ASC",
    )
    .bind(report_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|(game_type, score)| Score { game_type, score })
    .collect();

    Ok(Some(Report {
        child_name: key.child_name.clone(),
        session_id: key.session_id.clone(),
        scores,
        pairs,
    }))
}

/// Append `pair` unless the report already has one for its tick
///
/// Returns whether a row was inserted. The UNIQUE (report_id, tick_id)
/// constraint makes this a conditional insert.
pub async fn insert_pair(conn: &mut SqliteConnection, report_id: i64, pair: &Pair) -> Result<bool> {
    if pair.img_path.is_none() && pair.screenshot_path.is_none() {
        return Err(Error::Internal(format!("Refusing to store empty pair for tick {}", pair.tick)));
    }

    let emotions = pair
        .emotions
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to serialize emotions: {}", e)))?;
    let now = time::now_rfc3339();

    let result = sqlx::query(
        r#"
        INSERT INTO report_pairs (
            report_id, tick_id, img_path, screenshot_path, emotions, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (report_id, tick_id) DO NOTHING
        "#,
    )
    .bind(report_id)
    .bind(pair.tick.as_str())
    .bind(&pair.img_path)
    .bind(&pair.screenshot_path)
    .bind(&emotions)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Set one side of the pair for `tick`; returns false when no such pair exists
pub async fn update_pair_side(
    conn: &mut SqliteConnection,
    report_id: i64,
    tick: &TickId,
    side: ArtifactKind,
    path: &str,
) -> Result<bool> {
    let sql = match side {
        ArtifactKind::Frame => {
            "UPDATE report_pairs SET img_path = ?, updated_at = ? WHERE report_id = ? AND tick_id = ?"
        }
        ArtifactKind::Snapshot => {
            "UPDATE report_pairs SET screenshot_path = ?, updated_at = ? WHERE report_id = ? AND tick_id = ?"
        }
    };

    let result = sqlx::query(sql)
        .bind(path)
        .bind(time::now_rfc3339())
        .bind(report_id)
        .bind(tick.as_str())
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Replace the emotions annotation of the pair for `tick`
pub async fn update_pair_emotions(
    conn: &mut SqliteConnection,
    report_id: i64,
    tick: &TickId,
    emotions: &serde_json::Value,
) -> Result<bool> {
    let text = serde_json::to_string(emotions)
        .map_err(|e| Error::Internal(format!("Failed to serialize emotions: {}", e)))?;

    let result = sqlx::query(
        "UPDATE report_pairs SET emotions = ?, updated_at = ? WHERE report_id = ? AND tick_id = ?",
    )
    .bind(text)
    .bind(time::now_rfc3339())
    .bind(report_id)
    .bind(tick.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn insert_score(conn: &mut SqliteConnection, report_id: i64, score: &Score) -> Result<()> {
    sqlx::query(
        "INSERT INTO report_scores (report_id, game_type, score, recorded_at) VALUES (?, ?, ?, ?)",
    )
    .bind(report_id)
    .bind(&score.game_type)
    .bind(score.score)
    .bind(time::now_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArtifactName;
    use capture_common::db::init_in_memory_database;

    fn key() -> SessionKey {
        SessionKey::new("amy", "s1").unwrap()
    }

    fn frame_pair(filename: &str) -> Pair {
        let name = ArtifactName::parse(filename).unwrap();
        Pair::with_side(name.tick, ArtifactKind::Frame, format!("photos/amy/s1/{}", filename))
    }

    #[tokio::test]
    async fn test_missing_report_loads_as_none() {
        let pool = init_in_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        assert!(load_report(&mut conn, &key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ensure_report_is_idempotent() {
        let pool = init_in_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let first = ensure_report(&mut conn, &key()).await.unwrap();
        let second = ensure_report(&mut conn, &key()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_insert_pair_conflict_is_noop() {
        let pool = init_in_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let report_id = ensure_report(&mut conn, &key()).await.unwrap();

        assert!(insert_pair(&mut conn, report_id, &frame_pair("img-g1-4.png")).await.unwrap());
        assert!(!insert_pair(&mut conn, report_id, &frame_pair("img-g1-4.png")).await.unwrap());

        let report = load_report(&mut conn, &key()).await.unwrap().unwrap();
        assert_eq!(report.pairs.len(), 1);
    }

    #[tokio::test]
    async fn test_pairs_load_in_insertion_order() {
        let pool = init_in_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let report_id = ensure_report(&mut conn, &key()).await.unwrap();

        for filename in ["img-g1-8.png", "img-g1-4.png", "img-g1-12.png"] {
            insert_pair(&mut conn, report_id, &frame_pair(filename)).await.unwrap();
        }

        let report = load_report(&mut conn, &key()).await.unwrap().unwrap();
        let ticks: Vec<_> = report.pairs.iter().map(|p| p.tick.as_str().to_string()).collect();
        assert_eq!(ticks, vec!["*-g1-8.png", "*-g1-4.png", "*-g1-12.png"]);
    }

    #[tokio::test]
    async fn test_update_pair_side_reports_missing_pair() {
        let pool = init_in_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let report_id = ensure_report(&mut conn, &key()).await.unwrap();
        let tick = ArtifactName::parse("img-g1-4.png").unwrap().tick;

        let updated = update_pair_side(&mut conn, report_id, &tick, ArtifactKind::Snapshot, "x")
            .await
            .unwrap();
        assert!(!updated);
    }

    #[tokio::test]
    async fn test_emotions_and_scores_round_trip() {
        let pool = init_in_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let report_id = ensure_report(&mut conn, &key()).await.unwrap();
        let pair = frame_pair("img-g1-4.png");
        insert_pair(&mut conn, report_id, &pair).await.unwrap();

        let emotions = serde_json::json!({"happy": 0.7, "sad": 0.1});
        assert!(update_pair_emotions(&mut conn, report_id, &pair.tick, &emotions).await.unwrap());
        insert_score(
            &mut conn,
            report_id,
            &Score { game_type: "memory".to_string(), score: 8.0 },
        )
        .await
        .unwrap();

        let report = load_report(&mut conn, &key()).await.unwrap().unwrap();
        assert_eq!(report.pairs[0].emotions, Some(emotions));
        assert_eq!(report.scores, vec![Score { game_type: "memory".to_string(), score: 8.0 }]);
    }
}
