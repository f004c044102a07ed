use sqlx::{Executor, Result, Sqlite, SqlitePool};

use super::{PromptRow, feature_columns, tags_column};
use crate::color::ColorFeature;
use crate::record::{NewPrompt, Record};

const SELECT_PROMPT: &str = r#"
    SELECT id, title, prompt, image, tags, feature_r, feature_g, feature_b, created_at
    FROM prompt
"#;

/// 添加提示词记录
pub async fn add_prompt<'c, E>(executor: E, new: &NewPrompt) -> Result<Record>
where
    E: Executor<'c, Database = Sqlite>,
{
    let (r, g, b) = feature_columns(new.feature);
    let row = sqlx::query_as::<_, PromptRow>(
        r#"
        INSERT INTO prompt (title, prompt, image, tags, feature_r, feature_g, feature_b)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING id, title, prompt, image, tags, feature_r, feature_g, feature_b, created_at
        "#,
    )
    .bind(&new.title)
    .bind(&new.prompt)
    .bind(&new.image)
    .bind(tags_column(&new.tags))
    .bind(r)
    .bind(g)
    .bind(b)
    .fetch_one(executor)
    .await?;

    Ok(row.into())
}

/// 按原 ID 导入记录，`overwrite` 为 false 时跳过已存在的 ID
///
/// 返回是否写入
pub async fn import_record<'c, E>(executor: E, record: &Record, overwrite: bool) -> Result<bool>
where
    E: Executor<'c, Database = Sqlite>,
{
    let verb = if overwrite { "INSERT OR REPLACE" } else { "INSERT OR IGNORE" };
    let sql = format!(
        r#"
        {verb} INTO prompt (id, title, prompt, image, tags, feature_r, feature_g, feature_b, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, COALESCE(NULLIF(?, ''), strftime('%Y-%m-%dT%H:%M:%fZ', 'now')))
        "#
    );
    let (r, g, b) = feature_columns(record.feature);
    let result = sqlx::query(&sql)
        .bind(record.id)
        .bind(&record.title)
        .bind(&record.prompt)
        .bind(&record.image)
        .bind(tags_column(&record.tags))
        .bind(r)
        .bind(g)
        .bind(b)
        .bind(&record.created_at)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// 根据 ID 获取记录
pub async fn get_prompt(executor: &SqlitePool, id: i64) -> Result<Option<Record>> {
    let row = sqlx::query_as::<_, PromptRow>(&format!("{SELECT_PROMPT} WHERE id = ?"))
        .bind(id)
        .fetch_optional(executor)
        .await?;

    Ok(row.map(Into::into))
}

/// 获取所有记录，新记录在前
pub async fn list_prompts(executor: &SqlitePool) -> Result<Vec<Record>> {
    let rows = sqlx::query_as::<_, PromptRow>(&format!(
        "{SELECT_PROMPT} ORDER BY created_at DESC, id DESC"
    ))
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// 覆盖更新记录的可编辑字段
pub async fn update_prompt(executor: &SqlitePool, record: &Record) -> Result<bool> {
    let (r, g, b) = feature_columns(record.feature);
    let result = sqlx::query(
        r#"
        UPDATE prompt
        SET title = ?, prompt = ?, image = ?, tags = ?, feature_r = ?, feature_g = ?, feature_b = ?
        WHERE id = ?
        "#,
    )
    .bind(&record.title)
    .bind(&record.prompt)
    .bind(&record.image)
    .bind(tags_column(&record.tags))
    .bind(r)
    .bind(g)
    .bind(b)
    .bind(record.id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// 删除记录
pub async fn delete_prompt(executor: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM prompt WHERE id = ?").bind(id).execute(executor).await?;
    Ok(result.rows_affected() > 0)
}

/// 仅在记录尚无特征时写入特征
pub async fn set_feature_if_missing<'c, E>(executor: E, id: i64, feature: ColorFeature) -> Result<bool>
where
    E: Executor<'c, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE prompt SET feature_r = ?, feature_g = ?, feature_b = ?
        WHERE id = ? AND (feature_r IS NULL OR feature_g IS NULL OR feature_b IS NULL)
        "#,
    )
    .bind(feature.r as i64)
    .bind(feature.g as i64)
    .bind(feature.b as i64)
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// 查询记录总数和缺少特征的记录数
pub async fn get_count(executor: &SqlitePool) -> Result<(i64, i64)> {
    let (total, missing): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COALESCE(SUM(CASE WHEN feature_r IS NULL THEN 1 ELSE 0 END), 0)
        FROM prompt
        "#,
    )
    .fetch_one(executor)
    .await?;

    Ok((total, missing))
}
