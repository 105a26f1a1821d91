//! App-level store metadata.

use serde_json::{Map, Value, json};

use crate::api::model::{AppInfoAttributes, ListDocument, LocalizationAttributes};
use crate::api::{ApiError, ConnectApi, fetch};
use crate::config::DeployConfig;

/// Build an attributes object from the fields that are set.
pub(crate) fn attributes(fields: &[(&str, Option<&str>)]) -> Map<String, Value> {
    fields
        .iter()
        .filter_map(|(name, value)| value.map(|v| ((*name).to_string(), Value::from(v))))
        .collect()
}

/// Push the app name, subtitle, privacy policy URL and primary category.
///
/// Edits the localization matching `metadata.locale` on the app info that is
/// still editable, creating the localization when it does not exist yet.
pub async fn upload_metadata<A>(api: &A, app_id: &str, config: &DeployConfig) -> Result<(), ApiError>
where
    A: ConnectApi + ?Sized,
{
    let metadata = &config.metadata;

    let infos_path = format!("apps/{app_id}/appInfos");
    let infos: ListDocument<AppInfoAttributes> = fetch(api, &infos_path).await?;
    let app_info_id = infos
        .data
        .iter()
        .find(|info| info.attributes.as_ref().is_none_or(AppInfoAttributes::is_editable))
        .map(|info| info.id.clone())
        .ok_or(ApiError::MissingField {
            path: infos_path,
            field: "editable app info",
        })?;
    log::debug!("Editing app info {}", app_info_id);

    let fields = attributes(&[
        ("name", Some(config.app.name.as_str())),
        ("subtitle", metadata.subtitle.as_deref()),
        ("privacyPolicyUrl", metadata.privacy_policy_url.as_deref()),
    ]);

    let localizations_path = format!("appInfos/{app_info_id}/appInfoLocalizations");
    let localizations: ListDocument<LocalizationAttributes> =
        fetch(api, &localizations_path).await?;
    let existing = localizations.data.into_iter().find(|localization| {
        localization
            .attributes
            .as_ref()
            .is_some_and(|attributes| attributes.locale == metadata.locale)
    });

    match existing {
        Some(localization) => {
            log::info!("Updating {} app info localization", metadata.locale);
            let body = json!({
                "data": {
                    "type": "appInfoLocalizations",
                    "id": localization.id,
                    "attributes": fields,
                }
            });
            api.patch(&format!("appInfoLocalizations/{}", localization.id), body)
                .await?;
        }
        None => {
            log::info!("Creating {} app info localization", metadata.locale);
            let mut fields = fields;
            fields.insert("locale".to_string(), Value::from(metadata.locale.as_str()));
            let body = json!({
                "data": {
                    "type": "appInfoLocalizations",
                    "attributes": fields,
                    "relationships": {
                        "appInfo": { "data": { "type": "appInfos", "id": app_info_id } }
                    }
                }
            });
            api.post("appInfoLocalizations", body).await?;
        }
    }

    if let Some(category) = &metadata.primary_category {
        log::info!("Setting primary category {}", category);
        let body = json!({
            "data": {
                "type": "appInfos",
                "id": app_info_id,
                "relationships": {
                    "primaryCategory": { "data": { "type": "appCategories", "id": category } }
                }
            }
        });
        api.patch(&format!("appInfos/{app_info_id}"), body).await?;
    }

    Ok(())
}
