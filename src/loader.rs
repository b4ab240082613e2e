use crate::{
    config::GeometryOptions, error::StructureSetError, referenced_slice::ReferencedSlice,
    structure_set::DicomStructureSet,
};

use dicom::object::{FileDicomObject, InMemDicomObject, OpenFileOptions, open_file};
use dicom_dictionary_std::tags;
use futures::{StreamExt, stream::FuturesUnordered};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};
use web_time::Instant;

/// Outcome of resolving referenced slices from files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResolveSummary {
    /// Files looked at.
    pub scanned: usize,
    /// Referenced slices newly registered.
    pub registered: usize,
    /// Unreadable files, instances not referenced by the structure set and
    /// instances registered before.
    pub skipped: usize,
}

pub struct StructureSetLoader;

impl StructureSetLoader {
    /// Load a structure set from an RT-STRUCT file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is not a valid RT-STRUCT
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<DicomStructureSet, StructureSetError> {
        Self::load_from_file_with_options(path, GeometryOptions::default())
    }

    pub fn load_from_file_with_options(
        path: impl AsRef<Path>,
        options: GeometryOptions,
    ) -> Result<DicomStructureSet, StructureSetError> {
        let dicom_object = open_file(path.as_ref())?;
        DicomStructureSet::with_options(&dicom_object, options)
    }

    pub fn load_from_dicom_object(
        dicom_object: &FileDicomObject<InMemDicomObject>,
    ) -> Result<DicomStructureSet, StructureSetError> {
        DicomStructureSet::new(dicom_object)
    }

    /// Reads the headers of image files concurrently and registers those
    /// referenced by the structure set, in the order the reads complete.
    /// Then links the contours and estimates the slicing geometry.
    ///
    /// Files that cannot be read are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns error if a referenced slice comes from another series than
    /// those registered before, or if a reader task panicked.
    pub async fn resolve_from_file_paths(
        structure_set: &mut DicomStructureSet,
        paths: &[impl AsRef<Path>],
    ) -> Result<ResolveSummary, StructureSetError> {
        let start = Instant::now();
        let referenced = structure_set.referenced_instances();
        let mut summary = ResolveSummary::default();

        let mut headers: FuturesUnordered<_> = paths
            .iter()
            .map(|path| {
                let path = path.as_ref().to_path_buf();
                tokio::task::spawn_blocking(move || {
                    let header = Self::read_slice_header(&path);
                    (path, header)
                })
            })
            .collect();

        // Slices registered before a failure stay registered and are checked.
        let mut failure = None;
        while let Some(joined) = headers.next().await {
            let (path, header) = match joined {
                Ok(joined) => joined,
                Err(error) => {
                    failure = Some(StructureSetError::from(error));
                    break;
                }
            };
            summary.scanned += 1;

            match header {
                Ok((sop_instance_uid, slice)) if referenced.contains(&sop_instance_uid) => {
                    match structure_set.add_resolved_slice(&sop_instance_uid, slice) {
                        Ok(true) => summary.registered += 1,
                        Ok(false) => summary.skipped += 1,
                        Err(error) => {
                            failure = Some(error);
                            break;
                        }
                    }
                }
                Ok((sop_instance_uid, _)) => {
                    debug!(%sop_instance_uid, "Instance not referenced by the structure set");
                    summary.skipped += 1;
                }
                Err(error) => {
                    warn!(path = %path.display(), %error, "Skipping unreadable DICOM file");
                    summary.skipped += 1;
                }
            }
        }

        structure_set.check_referenced_slices();

        if let Some(error) = failure {
            warn!(
                registered = summary.registered,
                %error,
                "Stopped resolving referenced slices"
            );
            return Err(error);
        }

        info!(
            scanned = summary.scanned,
            registered = summary.registered,
            missing = referenced.len().saturating_sub(structure_set.referenced_slices().len()),
            elapsed = ?start.elapsed(),
            "Resolved referenced slices"
        );

        Ok(summary)
    }

    /// Same as [`Self::resolve_from_file_paths`] with every .dcm file of a
    /// directory.
    pub async fn resolve_from_directory(
        structure_set: &mut DicomStructureSet,
        path: impl AsRef<Path>,
    ) -> Result<ResolveSummary, StructureSetError> {
        let paths: Vec<PathBuf> = fs::read_dir(path.as_ref())?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
            })
            .collect();

        Self::resolve_from_file_paths(structure_set, &paths).await
    }

    fn read_slice_header(path: &Path) -> Result<(String, ReferencedSlice), StructureSetError> {
        let dicom_object = OpenFileOptions::new()
            .read_until(tags::PIXEL_DATA)
            .open_file(path)?;
        ReferencedSlice::from_dataset(&dicom_object)
    }
}
