//! Version records, builds and review submission.

use serde_json::{Value, json};

use super::metadata::attributes;
use crate::api::model::{
    AppStoreVersionAttributes, BuildAttributes, ListDocument, LocalizationAttributes,
    ResourceDocument, ReviewSubmissionAttributes,
};
use crate::api::{ApiError, ConnectApi, decode, fetch};
use crate::config::{MetadataSettings, Platform};
use crate::error::DeployError;

const EDITABLE_STATE: &str = "PREPARE_FOR_SUBMISSION";

/// The version record currently open for edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditableVersion {
    pub id: String,
    pub version_string: String,
}

/// Find the version in `PREPARE_FOR_SUBMISSION` for `platform`.
pub async fn find_editable_version<A>(
    api: &A,
    app_id: &str,
    platform: Platform,
) -> Result<Option<EditableVersion>, ApiError>
where
    A: ConnectApi + ?Sized,
{
    let path = format!(
        "apps/{app_id}/appStoreVersions?filter[appStoreState]={EDITABLE_STATE}&filter[platform]={platform}"
    );
    let versions: ListDocument<AppStoreVersionAttributes> = fetch(api, &path).await?;

    Ok(versions.data.into_iter().next().map(|resource| EditableVersion {
        version_string: resource
            .attributes
            .map(|attributes| attributes.version_string)
            .unwrap_or_default(),
        id: resource.id,
    }))
}

/// Create the version record for `version_string`, returning its id.
///
/// Re-running with the same version string returns the existing record as
/// long as it can still be edited. When another version is still being
/// prepared on the platform its version string is changed instead, since
/// only one may be open at a time.
pub async fn create_version<A>(
    api: &A,
    app_id: &str,
    platform: Platform,
    version_string: &str,
) -> Result<String, DeployError>
where
    A: ConnectApi + ?Sized,
{
    let path = format!(
        "apps/{app_id}/appStoreVersions?filter[versionString]={version_string}&filter[platform]={platform}"
    );
    let existing: ListDocument<AppStoreVersionAttributes> = fetch(api, &path).await?;
    if let Some(version) = existing.data.into_iter().next() {
        if let Some(attributes) = version.attributes.as_ref().filter(|a| !a.is_editable()) {
            return Err(DeployError::VersionLocked {
                version: version_string.to_string(),
                state: attributes.app_store_state.clone().unwrap_or_default(),
            });
        }
        log::info!("Version {} already exists ({})", version_string, version.id);
        return Ok(version.id);
    }

    if let Some(editable) = find_editable_version(api, app_id, platform).await? {
        log::info!(
            "Renaming editable version {} to {}",
            editable.version_string,
            version_string
        );
        let body = json!({
            "data": {
                "type": "appStoreVersions",
                "id": editable.id,
                "attributes": { "versionString": version_string }
            }
        });
        api.patch(&format!("appStoreVersions/{}", editable.id), body)
            .await?;
        return Ok(editable.id);
    }

    log::info!("Creating {} version {}", platform, version_string);
    let body = json!({
        "data": {
            "type": "appStoreVersions",
            "attributes": {
                "platform": platform.as_api_str(),
                "versionString": version_string,
            },
            "relationships": {
                "app": { "data": { "type": "apps", "id": app_id } }
            }
        }
    });
    let created: ResourceDocument<AppStoreVersionAttributes> =
        decode("appStoreVersions", api.post("appStoreVersions", body).await?)?;
    Ok(created.data.id)
}

/// Push description, keywords, promotional text and URLs to the version's
/// localization. Does nothing when none of them is configured.
pub async fn update_version_localization<A>(
    api: &A,
    version_id: &str,
    metadata: &MetadataSettings,
) -> Result<(), ApiError>
where
    A: ConnectApi + ?Sized,
{
    if !metadata.has_version_fields() {
        return Ok(());
    }

    let fields = attributes(&[
        ("description", metadata.description.as_deref()),
        ("keywords", metadata.keywords.as_deref()),
        ("promotionalText", metadata.promotional_text.as_deref()),
        ("supportUrl", metadata.support_url.as_deref()),
        ("marketingUrl", metadata.marketing_url.as_deref()),
    ]);

    let path = format!("appStoreVersions/{version_id}/appStoreVersionLocalizations");
    let localizations: ListDocument<LocalizationAttributes> = fetch(api, &path).await?;
    let existing = localizations.data.into_iter().find(|localization| {
        localization
            .attributes
            .as_ref()
            .is_some_and(|attributes| attributes.locale == metadata.locale)
    });

    match existing {
        Some(localization) => {
            let body = json!({
                "data": {
                    "type": "appStoreVersionLocalizations",
                    "id": localization.id,
                    "attributes": fields,
                }
            });
            api.patch(
                &format!("appStoreVersionLocalizations/{}", localization.id),
                body,
            )
            .await?;
        }
        None => {
            let mut fields = fields;
            fields.insert("locale".to_string(), Value::from(metadata.locale.as_str()));
            let body = json!({
                "data": {
                    "type": "appStoreVersionLocalizations",
                    "attributes": fields,
                    "relationships": {
                        "appStoreVersion": { "data": { "type": "appStoreVersions", "id": version_id } }
                    }
                }
            });
            api.post("appStoreVersionLocalizations", body).await?;
        }
    }

    Ok(())
}

/// Most recently uploaded build, if it has finished processing.
///
/// With `build_number` set, the most recent build must also carry that
/// number; an older processed build is not mistaken for the one just
/// uploaded.
pub async fn latest_processed_build<A>(
    api: &A,
    app_id: &str,
    build_number: Option<&str>,
) -> Result<Option<String>, ApiError>
where
    A: ConnectApi + ?Sized,
{
    let path = format!("builds?filter[app]={app_id}&sort=-uploadedDate&limit=1");
    let builds: ListDocument<BuildAttributes> = fetch(api, &path).await?;

    let Some(latest) = builds.data.into_iter().next() else {
        return Ok(None);
    };
    let Some(attributes) = latest.attributes else {
        return Ok(None);
    };

    if build_number.is_some_and(|expected| attributes.version != expected) {
        log::debug!(
            "Latest build is {}, waiting for {:?}",
            attributes.version,
            build_number
        );
        return Ok(None);
    }

    if !attributes.is_processed() {
        log::debug!(
            "Build {} is {}",
            attributes.version,
            attributes.processing_state.as_deref().unwrap_or("UNKNOWN")
        );
        return Ok(None);
    }

    Ok(Some(latest.id))
}

/// Build currently attached to a version, if any.
pub async fn attached_build<A>(api: &A, version_id: &str) -> Result<Option<String>, ApiError>
where
    A: ConnectApi + ?Sized,
{
    let path = format!("appStoreVersions/{version_id}?include=build");
    let document: ResourceDocument<AppStoreVersionAttributes> = fetch(api, &path).await?;

    Ok(document
        .included
        .into_iter()
        .find(|resource| resource.kind == "builds")
        .map(|resource| resource.id))
}

/// Point the version's build relationship at `build_id`.
pub async fn attach_build<A>(api: &A, version_id: &str, build_id: &str) -> Result<(), ApiError>
where
    A: ConnectApi + ?Sized,
{
    log::info!("Attaching build {} to version {}", build_id, version_id);
    let body = json!({ "data": { "type": "builds", "id": build_id } });
    api.patch(
        &format!("appStoreVersions/{version_id}/relationships/build"),
        body,
    )
    .await?;
    Ok(())
}

/// Submit the version for App Review, returning the review submission id.
///
/// An open submission that has not been sent yet is reused rather than
/// duplicated.
pub async fn submit_for_review<A>(
    api: &A,
    app_id: &str,
    version_id: &str,
    platform: Platform,
) -> Result<String, ApiError>
where
    A: ConnectApi + ?Sized,
{
    let open_path = format!(
        "reviewSubmissions?filter[app]={app_id}&filter[platform]={platform}&filter[state]=READY_FOR_REVIEW"
    );
    let open: ListDocument<ReviewSubmissionAttributes> = fetch(api, &open_path).await?;

    let submission_id = match open.data.into_iter().next() {
        Some(submission) => {
            log::info!("Reusing open review submission {}", submission.id);
            submission.id
        }
        None => {
            let body = json!({
                "data": {
                    "type": "reviewSubmissions",
                    "attributes": { "platform": platform.as_api_str() },
                    "relationships": {
                        "app": { "data": { "type": "apps", "id": app_id } }
                    }
                }
            });
            let created: ResourceDocument<ReviewSubmissionAttributes> =
                decode("reviewSubmissions", api.post("reviewSubmissions", body).await?)?;
            created.data.id
        }
    };

    let item = json!({
        "data": {
            "type": "reviewSubmissionItems",
            "relationships": {
                "reviewSubmission": { "data": { "type": "reviewSubmissions", "id": submission_id } },
                "appStoreVersion": { "data": { "type": "appStoreVersions", "id": version_id } }
            }
        }
    });
    api.post("reviewSubmissionItems", item).await?;

    let submit = json!({
        "data": {
            "type": "reviewSubmissions",
            "id": submission_id,
            "attributes": { "submitted": true }
        }
    });
    api.patch(&format!("reviewSubmissions/{submission_id}"), submit)
        .await?;

    log::info!("Submitted version {} for review ({})", version_id, submission_id);
    Ok(submission_id)
}
