//! Typed key-value settings.
//!
//! Values are stored as text next to their type and parsed on read.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Extension;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use signage_core::validation::require_non_empty;
use signage_core::{AppError, AuthInfo, permissions as perm};
use signage_db::{Setting, SettingType, UpsertSettingParams};
use tracing::{info, instrument};

use super::permissions::require_permission;
use crate::core::{ApiResponse, JsonBody, PathParam, QueryParams, ServiceContext, cache_keys};

pub const DEFAULT_CATEGORY: &str = "general";

/// Typed value of a stored setting. Unparsable numbers and JSON read as null.
#[must_use]
pub fn parse_value(raw: &str, setting_type: SettingType) -> Value {
    match setting_type {
        SettingType::String => Value::String(raw.to_string()),
        SettingType::Boolean => Value::Bool(raw == "true"),
        SettingType::Number => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(number_from_f64)
            .map_or(Value::Null, Value::Number),
        SettingType::Json => serde_json::from_str(raw).unwrap_or(Value::Null),
    }
}

/// Whole values become integers so `42` reads back as `42`, not `42.0`.
#[expect(clippy::cast_possible_truncation, reason = "range checked before the cast")]
fn number_from_f64(n: f64) -> Option<serde_json::Number> {
    const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;
    if n.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(&n) {
        return Some(serde_json::Number::from(n as i64));
    }
    serde_json::Number::from_f64(n)
}

/// Setting type matching a JSON value.
#[must_use]
pub const fn infer_type(value: &Value) -> SettingType {
    match value {
        Value::Bool(_) => SettingType::Boolean,
        Value::Number(_) => SettingType::Number,
        Value::String(_) => SettingType::String,
        Value::Null | Value::Array(_) | Value::Object(_) => SettingType::Json,
    }
}

/// Text stored for `value` under `setting_type`.
#[must_use]
pub fn stringify(value: &Value, setting_type: SettingType) -> String {
    match (setting_type, value) {
        (SettingType::Json, v) => v.to_string(),
        (_, Value::String(s)) => s.clone(),
        (_, Value::Null) => String::new(),
        (_, v) => v.to_string(),
    }
}

/// Category of a dotted key: the segment before the first `.`.
#[must_use]
pub fn category_of(key: &str) -> &str {
    match key.split_once('.') {
        Some((prefix, _)) if !prefix.is_empty() => prefix,
        _ => DEFAULT_CATEGORY,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingView {
    pub key: String,
    pub value: Value,
    #[serde(rename = "type")]
    pub setting_type: SettingType,
    pub category: String,
    pub description: Option<String>,
}

impl From<Setting> for SettingView {
    fn from(s: Setting) -> Self {
        Self {
            value: parse_value(&s.value, s.setting_type),
            key: s.key,
            setting_type: s.setting_type,
            category: s.category,
            description: s.description,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SettingsQuery {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSettingRequest {
    pub value: Value,
    #[serde(rename = "type")]
    pub setting_type: Option<SettingType>,
    pub category: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkResult {
    pub count: usize,
}

#[derive(Clone)]
pub struct SettingsService {
    ctx: Arc<ServiceContext>,
}

impl SettingsService {
    #[must_use]
    pub const fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    /// Map of key to parsed value, cached for the public API.
    pub async fn get_all(&self, category: Option<&str>) -> Result<Value, AppError> {
        let db = self.ctx.db();
        let key = cache_keys::settings(category);
        self.ctx
            .cache()
            .wrap(&key, cache_keys::SETTINGS_TTL, || async {
                let settings = db.settings.list(category).await?;
                let map: Map<String, Value> = settings
                    .into_iter()
                    .map(|s| {
                        let value = parse_value(&s.value, s.setting_type);
                        (s.key, value)
                    })
                    .collect();
                Ok(Value::Object(map))
            })
            .await
    }

    pub async fn get(&self, auth: &AuthInfo, key: &str) -> Result<SettingView, AppError> {
        require_permission(&self.ctx, auth, &[perm::SETTINGS_READ]).await?;
        Ok(self.ctx.db().settings.get(key).await?.into())
    }

    pub async fn set(
        &self,
        auth: &AuthInfo,
        key: &str,
        req: SetSettingRequest,
    ) -> Result<SettingView, AppError> {
        require_permission(&self.ctx, auth, &[perm::SETTINGS_WRITE]).await?;
        require_non_empty("key", key)?;

        let setting_type = req.setting_type.unwrap_or_else(|| infer_type(&req.value));
        let value = stringify(&req.value, setting_type);
        let category = req.category.as_deref().unwrap_or_else(|| category_of(key));

        let setting = self
            .ctx
            .db()
            .settings
            .upsert(UpsertSettingParams {
                key,
                value: &value,
                setting_type,
                category,
                description: req.description.as_deref(),
            })
            .await?;

        self.ctx.invalidate(&[cache_keys::SETTINGS_PREFIX]).await;
        info!(key, by = auth.user_id, "Setting updated");
        Ok(setting.into())
    }

    /// Upsert many keys at once; types and categories are inferred.
    pub async fn set_bulk(
        &self,
        auth: &AuthInfo,
        values: &BTreeMap<String, Value>,
    ) -> Result<usize, AppError> {
        require_permission(&self.ctx, auth, &[perm::SETTINGS_WRITE]).await?;
        if values.keys().any(|k| k.trim().is_empty()) {
            return Err(AppError::invalid("Setting keys must not be empty"));
        }

        let rows: Vec<(SettingType, String)> = values
            .values()
            .map(|v| {
                let t = infer_type(v);
                (t, stringify(v, t))
            })
            .collect();
        let params: Vec<UpsertSettingParams<'_>> = values
            .keys()
            .zip(&rows)
            .map(|(key, (setting_type, value))| UpsertSettingParams {
                key,
                value,
                setting_type: *setting_type,
                category: category_of(key),
                description: None,
            })
            .collect();

        let count = self.ctx.db().settings.upsert_many(&params).await?;
        self.ctx.invalidate(&[cache_keys::SETTINGS_PREFIX]).await;
        info!(count, by = auth.user_id, "Settings updated in bulk");
        Ok(count)
    }

    pub async fn delete(&self, auth: &AuthInfo, key: &str) -> Result<(), AppError> {
        require_permission(&self.ctx, auth, &[perm::SETTINGS_WRITE]).await?;
        self.ctx.db().settings.delete(key).await?;
        self.ctx.invalidate(&[cache_keys::SETTINGS_PREFIX]).await;
        info!(key, by = auth.user_id, "Setting deleted");
        Ok(())
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Shared by the public and the admin route.
#[instrument(skip(svc))]
pub async fn get_all(
    State(svc): State<SettingsService>,
    QueryParams(query): QueryParams<SettingsQuery>,
) -> Result<ApiResponse<Value>, AppError> {
    let category = query.category.as_deref().map(str::trim).filter(|c| !c.is_empty());
    Ok(ApiResponse::ok(svc.get_all(category).await?))
}

#[instrument(skip(svc, auth), fields(user_id = auth.user_id))]
pub async fn get(
    State(svc): State<SettingsService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam(key): PathParam<String>,
) -> Result<ApiResponse<SettingView>, AppError> {
    Ok(ApiResponse::ok(svc.get(&auth, &key).await?))
}

#[instrument(skip(svc, auth, req), fields(user_id = auth.user_id))]
pub async fn set(
    State(svc): State<SettingsService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam(key): PathParam<String>,
    JsonBody(req): JsonBody<SetSettingRequest>,
) -> Result<ApiResponse<SettingView>, AppError> {
    let setting = svc.set(&auth, &key, req).await?;
    Ok(ApiResponse::ok(setting).with_message("Setting saved"))
}

#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn set_bulk(
    State(svc): State<SettingsService>,
    Extension(auth): Extension<AuthInfo>,
    JsonBody(values): JsonBody<BTreeMap<String, Value>>,
) -> Result<ApiResponse<BulkResult>, AppError> {
    let count = svc.set_bulk(&auth, &values).await?;
    Ok(ApiResponse::ok(BulkResult { count }).with_message(format!("{count} setting(s) saved")))
}

#[instrument(skip(svc, auth), fields(user_id = auth.user_id))]
pub async fn delete(
    State(svc): State<SettingsService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam(key): PathParam<String>,
) -> Result<ApiResponse<()>, AppError> {
    svc.delete(&auth, &key).await?;
    Ok(ApiResponse::message("Setting deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn values_parse_by_type() {
        assert_eq!(parse_value("hello", SettingType::String), json!("hello"));
        assert_eq!(parse_value("true", SettingType::Boolean), json!(true));
        assert_eq!(parse_value("yes", SettingType::Boolean), json!(false));
        assert_eq!(parse_value("2.5", SettingType::Number), json!(2.5));
        assert_eq!(parse_value("-3", SettingType::Number), json!(-3));
        assert_eq!(parse_value("{\"a\":1}", SettingType::Json), json!({"a": 1}));
    }

    #[test]
    fn whole_numbers_read_back_as_integers() {
        let value = parse_value("42", SettingType::Number);
        assert_eq!(value, json!(42));
        assert!(value.is_i64());
        assert_eq!(value.to_string(), "42");
        assert_eq!(parse_value("30.0", SettingType::Number).to_string(), "30");
    }

    #[test]
    fn broken_values_read_as_null() {
        assert_eq!(parse_value("abc", SettingType::Number), Value::Null);
        assert_eq!(parse_value("{oops", SettingType::Json), Value::Null);
    }

    #[test]
    fn types_are_inferred_from_json() {
        assert_eq!(infer_type(&json!(true)), SettingType::Boolean);
        assert_eq!(infer_type(&json!(3)), SettingType::Number);
        assert_eq!(infer_type(&json!("x")), SettingType::String);
        assert_eq!(infer_type(&json!([1, 2])), SettingType::Json);
        assert_eq!(infer_type(&json!({"k": "v"})), SettingType::Json);
    }

    #[test]
    fn stringify_follows_type() {
        assert_eq!(stringify(&json!("plain"), SettingType::String), "plain");
        assert_eq!(stringify(&json!(false), SettingType::Boolean), "false");
        assert_eq!(stringify(&json!(42), SettingType::Number), "42");
        assert_eq!(stringify(&json!("quoted"), SettingType::Json), "\"quoted\"");
        assert_eq!(stringify(&json!({"a": 1}), SettingType::Json), "{\"a\":1}");
    }

    #[test]
    fn stored_text_reads_back_as_the_same_value() {
        for value in [json!(true), json!(7.5), json!(42), json!("text"), json!({"n": [1]})] {
            let t = infer_type(&value);
            assert_eq!(parse_value(&stringify(&value, t), t), value);
        }
    }

    #[test]
    fn category_comes_from_key_prefix() {
        assert_eq!(category_of("display.refreshInterval"), "display");
        assert_eq!(category_of("a.b.c"), "a");
        assert_eq!(category_of("siteName"), DEFAULT_CATEGORY);
        assert_eq!(category_of(".hidden"), DEFAULT_CATEGORY);
    }

    #[test]
    fn view_parses_the_stored_value() {
        let now = chrono::Utc::now();
        let view = SettingView::from(Setting {
            key: "display.refresh".to_string(),
            value: "30".to_string(),
            setting_type: SettingType::Number,
            category: "display".to_string(),
            description: None,
            created_at: now,
            updated_at: now,
        });
        let json = serde_json::to_value(view).unwrap();
        assert_eq!(json["value"], json!(30));
        assert_eq!(json["type"], "number");
    }
}
