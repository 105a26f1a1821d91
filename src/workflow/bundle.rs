//! Bundle identifier registration and app lookup.

use serde_json::json;

use crate::api::model::{AppAttributes, BundleIdAttributes, ListDocument, ResourceDocument};
use crate::api::{ApiError, ConnectApi, decode, fetch};
use crate::config::AppSettings;

/// Register the bundle identifier, or return the existing registration.
///
/// Safe to run repeatedly: an existing identifier is never re-created and the
/// same resource id is returned each time.
pub async fn register_bundle_id<A>(api: &A, app: &AppSettings) -> Result<String, ApiError>
where
    A: ConnectApi + ?Sized,
{
    let path = format!("bundleIds?filter[identifier]={}", app.bundle_id);
    let existing: ListDocument<BundleIdAttributes> = fetch(api, &path).await?;

    // The identifier filter also returns ids that merely start with ours
    let found = existing.data.into_iter().find(|resource| {
        resource
            .attributes
            .as_ref()
            .is_some_and(|attributes| attributes.identifier == app.bundle_id)
    });

    if let Some(resource) = found {
        log::info!("Bundle ID {} already registered ({})", app.bundle_id, resource.id);
        return Ok(resource.id);
    }

    log::info!("Registering bundle ID {}", app.bundle_id);
    let body = json!({
        "data": {
            "type": "bundleIds",
            "attributes": {
                "identifier": app.bundle_id,
                "name": app.name,
                "platform": app.platform.bundle_id_platform(),
            }
        }
    });

    let created: ResourceDocument<BundleIdAttributes> =
        decode("bundleIds", api.post("bundleIds", body).await?)?;
    Ok(created.data.id)
}

/// Look up the app record for a bundle identifier.
///
/// `None` means the app has not been created in App Store Connect yet; that
/// can only be done from the web interface.
pub async fn find_app_id<A>(api: &A, bundle_id: &str) -> Result<Option<String>, ApiError>
where
    A: ConnectApi + ?Sized,
{
    let path = format!("apps?filter[bundleId]={bundle_id}");
    let apps: ListDocument<AppAttributes> = fetch(api, &path).await?;

    Ok(apps
        .data
        .into_iter()
        .find(|resource| {
            resource
                .attributes
                .as_ref()
                .is_none_or(|attributes| attributes.bundle_id == bundle_id)
        })
        .map(|resource| resource.id))
}
