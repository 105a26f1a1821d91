//! Screenshot upload.
//!
//! Screenshots are read from `<directory>/<DISPLAY_TYPE>/<file>`, where the
//! sub-directory name is an App Store Connect display type such as
//! `APP_IPHONE_67` or `APP_DESKTOP`. Each file goes through the asset upload
//! protocol: reserve, send every upload operation, commit with a checksum.
//! A file counts as present only once its delivery completed; a reservation
//! left behind by an interrupted run is deleted and the file sent again.

use bytes::Bytes;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::api::model::{
    ListDocument, LocalizationAttributes, ResourceDocument, ScreenshotAttributes,
    ScreenshotSetAttributes, UploadOperation,
};
use crate::api::{ApiError, ConnectApi, decode, fetch};
use crate::error::{CliError, DeployError};

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Counts from one screenshot upload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScreenshotReport {
    /// Display types touched
    pub sets: usize,
    /// Files sent
    pub uploaded: usize,
    /// Files already delivered remotely under the same name
    pub skipped: usize,
    /// Unfinished reservations deleted before sending the file again
    pub replaced: usize,
}

/// Group image files under `dir` by display type, sorted by file name.
pub fn collect_screenshots(dir: &Path) -> Result<BTreeMap<String, Vec<PathBuf>>, DeployError> {
    if !dir.is_dir() {
        return Err(CliError::InvalidArguments {
            reason: format!("screenshot directory {} does not exist", dir.display()),
        }
        .into());
    }

    let mut sets: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for entry in WalkDir::new(dir).min_depth(2).max_depth(2).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() || !is_image(entry.path()) {
            continue;
        }

        let display_type = entry
            .path()
            .parent()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned());
        if let Some(display_type) = display_type {
            sets.entry(display_type)
                .or_default()
                .push(entry.path().to_path_buf());
        }
    }

    Ok(sets)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Byte range of `data` an upload operation covers, if it fits.
fn operation_range(operation: &UploadOperation, total: usize) -> Option<Range<usize>> {
    let start = usize::try_from(operation.offset).ok()?;
    let length = usize::try_from(operation.length).ok()?;
    let end = start.checked_add(length)?;
    (end <= total).then_some(start..end)
}

/// Upload every screenshot under `dir` to the `locale` localization of a
/// version.
pub async fn upload_screenshots<A>(
    api: &A,
    version_id: &str,
    locale: &str,
    dir: &Path,
) -> Result<ScreenshotReport, DeployError>
where
    A: ConnectApi + ?Sized,
{
    let files = collect_screenshots(dir)?;
    if files.is_empty() {
        return Err(CliError::InvalidArguments {
            reason: format!("no screenshots found under {}", dir.display()),
        }
        .into());
    }

    let localizations_path = format!("appStoreVersions/{version_id}/appStoreVersionLocalizations");
    let localizations: ListDocument<LocalizationAttributes> =
        fetch(api, &localizations_path).await?;
    let localization_id = localizations
        .data
        .into_iter()
        .find(|localization| {
            localization
                .attributes
                .as_ref()
                .is_some_and(|attributes| attributes.locale == locale)
        })
        .map(|localization| localization.id)
        .ok_or(ApiError::MissingField {
            path: localizations_path,
            field: "localization for the screenshot locale",
        })?;

    let sets_path = format!("appStoreVersionLocalizations/{localization_id}/appScreenshotSets");
    let existing_sets: ListDocument<ScreenshotSetAttributes> = fetch(api, &sets_path).await?;
    let mut set_ids: BTreeMap<String, String> = existing_sets
        .data
        .into_iter()
        .filter_map(|set| {
            set.attributes
                .map(|attributes| (attributes.screenshot_display_type, set.id))
        })
        .collect();

    let mut report = ScreenshotReport::default();

    for (display_type, paths) in &files {
        let set_id = match set_ids.get(display_type) {
            Some(id) => id.clone(),
            None => {
                let id = create_screenshot_set(api, &localization_id, display_type).await?;
                set_ids.insert(display_type.clone(), id.clone());
                id
            }
        };
        report.sets += 1;

        let remote = remote_screenshots(api, &set_id).await?;
        for path in paths {
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let matching = remote.get(&file_name).map(Vec::as_slice).unwrap_or_default();
            if matching.iter().any(|screenshot| screenshot.complete) {
                log::info!("{}/{} already uploaded", display_type, file_name);
                report.skipped += 1;
                continue;
            }

            for stale in matching {
                log::info!(
                    "Removing unfinished upload of {}/{} ({})",
                    display_type,
                    file_name,
                    stale.id
                );
                api.delete(&format!("appScreenshots/{}", stale.id)).await?;
                report.replaced += 1;
            }

            upload_one(api, &set_id, path, &file_name).await?;
            log::info!("Uploaded {}/{}", display_type, file_name);
            report.uploaded += 1;
        }
    }

    Ok(report)
}

async fn create_screenshot_set<A>(
    api: &A,
    localization_id: &str,
    display_type: &str,
) -> Result<String, ApiError>
where
    A: ConnectApi + ?Sized,
{
    log::info!("Creating screenshot set {}", display_type);
    let body = json!({
        "data": {
            "type": "appScreenshotSets",
            "attributes": { "screenshotDisplayType": display_type },
            "relationships": {
                "appStoreVersionLocalization": {
                    "data": { "type": "appStoreVersionLocalizations", "id": localization_id }
                }
            }
        }
    });
    let created: ResourceDocument<ScreenshotSetAttributes> =
        decode("appScreenshotSets", api.post("appScreenshotSets", body).await?)?;
    Ok(created.data.id)
}

/// A screenshot already in a set
struct RemoteScreenshot {
    id: String,
    complete: bool,
}

/// Screenshots of a set keyed by file name
async fn remote_screenshots<A>(
    api: &A,
    set_id: &str,
) -> Result<HashMap<String, Vec<RemoteScreenshot>>, ApiError>
where
    A: ConnectApi + ?Sized,
{
    let path = format!("appScreenshotSets/{set_id}/appScreenshots");
    let screenshots: ListDocument<ScreenshotAttributes> = fetch(api, &path).await?;

    let mut by_name: HashMap<String, Vec<RemoteScreenshot>> = HashMap::new();
    for screenshot in screenshots.data {
        let Some(attributes) = screenshot.attributes else {
            continue;
        };
        let complete = attributes.is_complete();
        if let Some(file_name) = attributes.file_name {
            by_name.entry(file_name).or_default().push(RemoteScreenshot {
                id: screenshot.id,
                complete,
            });
        }
    }
    Ok(by_name)
}

async fn upload_one<A>(api: &A, set_id: &str, path: &Path, file_name: &str) -> Result<(), DeployError>
where
    A: ConnectApi + ?Sized,
{
    let data = Bytes::from(tokio::fs::read(path).await?);

    let reserve = json!({
        "data": {
            "type": "appScreenshots",
            "attributes": { "fileName": file_name, "fileSize": data.len() },
            "relationships": {
                "appScreenshotSet": { "data": { "type": "appScreenshotSets", "id": set_id } }
            }
        }
    });
    let reserved: ResourceDocument<ScreenshotAttributes> =
        decode("appScreenshots", api.post("appScreenshots", reserve).await?)?;
    let screenshot_id = reserved.data.id;
    let operations = reserved
        .data
        .attributes
        .and_then(|attributes| attributes.upload_operations)
        .unwrap_or_default();

    if operations.is_empty() {
        return Err(ApiError::MissingField {
            path: "appScreenshots".to_string(),
            field: "uploadOperations",
        }
        .into());
    }

    for operation in &operations {
        let range = operation_range(operation, data.len()).ok_or_else(|| {
            DeployError::Anyhow(anyhow::anyhow!(
                "upload operation {}+{} is outside {} ({} bytes)",
                operation.offset,
                operation.length,
                file_name,
                data.len()
            ))
        })?;
        api.upload(operation, data.slice(range)).await?;
    }

    let checksum = format!("{:x}", md5::compute(&data));
    let commit = json!({
        "data": {
            "type": "appScreenshots",
            "id": screenshot_id,
            "attributes": { "uploaded": true, "sourceFileChecksum": checksum }
        }
    });
    api.patch(&format!("appScreenshots/{screenshot_id}"), commit)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operation(offset: u64, length: u64) -> UploadOperation {
        UploadOperation {
            method: "PUT".to_string(),
            url: "https://upload.example.invalid/part".to_string(),
            length,
            offset,
            request_headers: Vec::new(),
        }
    }

    #[test]
    fn collects_images_grouped_by_display_type() {
        let root = tempfile::tempdir().unwrap();
        let iphone = root.path().join("APP_IPHONE_67");
        let ipad = root.path().join("APP_IPAD_PRO_129");
        std::fs::create_dir_all(&iphone).unwrap();
        std::fs::create_dir_all(&ipad).unwrap();

        std::fs::write(iphone.join("02_settings.png"), b"png").unwrap();
        std::fs::write(iphone.join("01_home.PNG"), b"png").unwrap();
        std::fs::write(iphone.join("notes.txt"), b"skip").unwrap();
        std::fs::write(ipad.join("01.jpeg"), b"jpeg").unwrap();
        std::fs::write(root.path().join("stray.png"), b"top level").unwrap();

        let sets = collect_screenshots(root.path()).unwrap();

        assert_eq!(sets.len(), 2);
        let names: Vec<_> = sets["APP_IPHONE_67"]
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["01_home.PNG", "02_settings.png"]);
        assert_eq!(sets["APP_IPAD_PRO_129"].len(), 1);
    }

    #[test]
    fn missing_directory_is_reported() {
        let err = collect_screenshots(Path::new("/no/such/screenshots")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn operation_range_checks_bounds() {
        assert_eq!(operation_range(&operation(0, 10), 20), Some(0..10));
        assert_eq!(operation_range(&operation(10, 10), 20), Some(10..20));
        assert_eq!(operation_range(&operation(15, 10), 20), None);
        assert_eq!(operation_range(&operation(u64::MAX, 1), 20), None);
    }
}
