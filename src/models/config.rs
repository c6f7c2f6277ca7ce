use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Spreadsheet flavour the gateway writes its tag reports in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    #[default]
    Xlsx,
    Xls,
}

/// OCR quality preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    Fast,
    #[default]
    Balanced,
    HighQuality,
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingMode::Fast => write!(f, "fast"),
            ProcessingMode::Balanced => write!(f, "balanced"),
            ProcessingMode::HighQuality => write!(f, "high_quality"),
        }
    }
}

impl FromStr for ProcessingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "fast" => Ok(ProcessingMode::Fast),
            "balanced" => Ok(ProcessingMode::Balanced),
            "high_quality" => Ok(ProcessingMode::HighQuality),
            other => Err(format!(
                "unknown processing mode '{}' (expected fast, balanced or high_quality)",
                other
            )),
        }
    }
}

/// Reasons a configuration is rejected before a job may start.
///
/// [`Configuration::validate`] reports only the first failing rule.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Source folder is not set")]
    MissingSourceFolder,

    #[error("Staging area is not set")]
    MissingStagingArea,

    #[error("Source folder does not exist: {0}")]
    SourceFolderNotFound(Utf8PathBuf),

    #[error("Pattern mapping file does not exist: {0}")]
    PatternFileNotFound(Utf8PathBuf),

    #[error("{field} = {value} is outside the allowed range {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("OCR DPI minimum ({min}) is greater than maximum ({max})")]
    InvalidDpiRange { min: u32, max: u32 },
}

impl ValidationError {
    /// True when the failure is about the source folder being absent on disk.
    pub fn is_source_missing(&self) -> bool {
        matches!(self, ValidationError::SourceFolderNotFound(_))
    }
}

/// Complete set of processing options for one gateway project.
///
/// Every field falls back to its default independently when absent from a
/// stored document, so documents written by older versions keep loading.
/// Optional folders are stored as empty strings when unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    // Identity
    pub name: String,
    #[serde(with = "optional_path")]
    pub config_location: Option<Utf8PathBuf>,

    // Folders
    pub source_folder: Utf8PathBuf,
    #[serde(with = "optional_path")]
    pub destination_folder: Option<Utf8PathBuf>,
    pub staging_area: Utf8PathBuf,
    #[serde(with = "optional_path")]
    pub processed_folder: Option<Utf8PathBuf>,
    #[serde(with = "optional_path")]
    pub unprocessed_folder: Option<Utf8PathBuf>,
    #[serde(with = "optional_path")]
    pub log_folder: Option<Utf8PathBuf>,
    #[serde(with = "optional_path")]
    pub pattern_mapping_file: Option<Utf8PathBuf>,
    pub default_context: String,

    // Behavior flags
    pub include_subfolders: bool,
    pub copy_source_files: bool,
    pub copy_other_files: bool,
    pub move_processed: bool,
    pub search_filenames_for_tags: bool,
    pub create_trigger_file: bool,
    pub insert_line_breaks: bool,
    #[serde(alias = "object_id_from_vnet")]
    pub object_id_from_source: bool,

    // Spreadsheet output
    pub use_ranges: bool,
    pub document_type: DocumentType,

    // Timeouts
    pub open_file_timeout_enabled: bool,
    pub open_file_timeout: u32,
    pub processing_timeout_enabled: bool,
    pub processing_timeout: f64,
    #[serde(alias = "als_retry_timeout")]
    pub retry_timeout: u32,

    // Conversion
    pub convert_doc: bool,
    pub convert_xls: bool,

    // OCR
    pub use_ocr: bool,
    pub ocr_language: String,
    pub ocr_dpi: u32,
    pub extract_vertical_text: bool,
    pub rotate_for_ocr: bool,

    // Advanced OCR
    pub adaptive_dpi: bool,
    pub dpi_min: u32,
    pub dpi_max: u32,
    pub preprocess_images: bool,
    pub enhance_contrast: f64,
    pub enhance_sharpness: f64,
    pub denoise: bool,
    pub use_multi_pass_ocr: bool,
    pub detect_regions: bool,
    pub min_text_confidence: u32,
    pub save_debug_images: bool,

    pub processing_mode: ProcessingMode,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            name: "My P&ID Project".to_string(),
            config_location: None,
            source_folder: Utf8PathBuf::new(),
            destination_folder: None,
            staging_area: Utf8PathBuf::new(),
            processed_folder: None,
            unprocessed_folder: None,
            log_folder: None,
            pattern_mapping_file: None,
            default_context: "Plant|Process Area".to_string(),
            include_subfolders: true,
            copy_source_files: true,
            copy_other_files: false,
            move_processed: true,
            search_filenames_for_tags: false,
            create_trigger_file: true,
            insert_line_breaks: true,
            object_id_from_source: false,
            use_ranges: false,
            document_type: DocumentType::Xlsx,
            open_file_timeout_enabled: true,
            open_file_timeout: 30,
            processing_timeout_enabled: false,
            processing_timeout: 60.0,
            retry_timeout: 120,
            convert_doc: false,
            convert_xls: false,
            use_ocr: true,
            ocr_language: "eng".to_string(),
            ocr_dpi: 300,
            extract_vertical_text: true,
            rotate_for_ocr: true,
            adaptive_dpi: true,
            dpi_min: 300,
            dpi_max: 500,
            preprocess_images: true,
            enhance_contrast: 1.5,
            enhance_sharpness: 1.5,
            denoise: true,
            use_multi_pass_ocr: true,
            detect_regions: true,
            min_text_confidence: 60,
            save_debug_images: false,
            processing_mode: ProcessingMode::Balanced,
        }
    }
}

impl Configuration {
    /// Create a default configuration for a named project.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Check that the configuration can be handed to a job.
    ///
    /// Rules are checked in a fixed order and the first failure wins:
    /// required folders, source folder presence on disk, pattern file
    /// presence, numeric bounds, and finally DPI ordering.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.source_folder.as_str().trim().is_empty() {
            return Err(ValidationError::MissingSourceFolder);
        }

        if self.staging_area.as_str().trim().is_empty() {
            return Err(ValidationError::MissingStagingArea);
        }

        if !self.source_folder.is_dir() {
            return Err(ValidationError::SourceFolderNotFound(
                self.source_folder.clone(),
            ));
        }

        if let Some(pattern_file) = &self.pattern_mapping_file {
            if !pattern_file.exists() {
                return Err(ValidationError::PatternFileNotFound(pattern_file.clone()));
            }
        }

        let bounds: [(&'static str, f64, f64, f64); 9] = [
            ("open_file_timeout", self.open_file_timeout as f64, 1.0, 300.0),
            ("processing_timeout", self.processing_timeout, 0.0, 120.0),
            ("retry_timeout", self.retry_timeout as f64, 1.0, 300.0),
            ("ocr_dpi", self.ocr_dpi as f64, 200.0, 600.0),
            ("dpi_min", self.dpi_min as f64, 200.0, 400.0),
            ("dpi_max", self.dpi_max as f64, 300.0, 600.0),
            ("enhance_contrast", self.enhance_contrast, 1.0, 3.0),
            ("enhance_sharpness", self.enhance_sharpness, 1.0, 3.0),
            ("min_text_confidence", self.min_text_confidence as f64, 50.0, 90.0),
        ];

        for (field, value, min, max) in bounds {
            // NaN fails both comparisons, so test for containment instead
            if !(min..=max).contains(&value) {
                return Err(ValidationError::OutOfRange {
                    field,
                    value,
                    min,
                    max,
                });
            }
        }

        if self.dpi_min > self.dpi_max {
            return Err(ValidationError::InvalidDpiRange {
                min: self.dpi_min,
                max: self.dpi_max,
            });
        }

        Ok(())
    }

    /// Apply an OCR quality preset, overwriting the options it controls.
    pub fn apply_processing_mode(&mut self, mode: ProcessingMode) {
        match mode {
            ProcessingMode::Fast => {
                self.adaptive_dpi = false;
                self.preprocess_images = false;
                self.use_multi_pass_ocr = false;
                self.detect_regions = false;
            }
            ProcessingMode::Balanced => {
                self.adaptive_dpi = true;
                self.dpi_max = 500;
                self.preprocess_images = true;
                self.use_multi_pass_ocr = true;
                self.detect_regions = true;
            }
            ProcessingMode::HighQuality => {
                self.adaptive_dpi = true;
                self.dpi_max = 600;
                self.preprocess_images = true;
                self.enhance_contrast = 2.0;
                self.enhance_sharpness = 2.0;
                self.denoise = true;
                self.use_multi_pass_ocr = true;
                self.detect_regions = true;
            }
        }
        self.processing_mode = mode;
    }

    /// Folders a job creates before touching any file.
    pub fn output_folders(&self) -> Vec<&Utf8Path> {
        let mut folders = vec![self.staging_area.as_path()];
        for folder in [
            &self.processed_folder,
            &self.unprocessed_folder,
            &self.log_folder,
        ]
        .into_iter()
        .flatten()
        {
            folders.push(folder.as_path());
        }
        folders
    }

    /// Processing timeout handed to the gateway, if enabled.
    pub fn processing_timeout_duration(&self) -> Option<Duration> {
        if self.processing_timeout_enabled && self.processing_timeout > 0.0 {
            Some(Duration::from_secs_f64(self.processing_timeout * 60.0))
        } else {
            None
        }
    }

    /// Open-file timeout handed to the gateway, if enabled.
    pub fn open_file_timeout_duration(&self) -> Option<Duration> {
        self.open_file_timeout_enabled
            .then(|| Duration::from_secs(self.open_file_timeout as u64))
    }
}

/// Optional paths are persisted as plain strings, empty meaning unset.
mod optional_path {
    use super::*;

    pub fn serialize<S>(path: &Option<Utf8PathBuf>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match path {
            Some(path) => serializer.serialize_str(path.as_str()),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Utf8PathBuf>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.filter(|s| !s.is_empty()).map(Utf8PathBuf::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn valid_config(temp: &TempDir) -> Configuration {
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
        let mut config = Configuration::named("Test");
        config.source_folder = root.clone();
        config.staging_area = root.join("staging");
        config
    }

    #[test]
    fn test_defaults() {
        let config = Configuration::default();
        assert_eq!(config.name, "My P&ID Project");
        assert_eq!(config.open_file_timeout, 30);
        assert_eq!(config.retry_timeout, 120);
        assert_eq!(config.dpi_min, 300);
        assert_eq!(config.dpi_max, 500);
        assert_eq!(config.min_text_confidence, 60);
        assert_eq!(config.document_type, DocumentType::Xlsx);
        assert_eq!(config.processing_mode, ProcessingMode::Balanced);
        assert!(config.include_subfolders);
        assert!(!config.copy_other_files);
        assert!(config.pattern_mapping_file.is_none());
    }

    #[test]
    fn test_validate_ok() {
        let temp = TempDir::new().unwrap();
        assert_eq!(valid_config(&temp).validate(), Ok(()));
    }

    #[test]
    fn test_validate_reports_first_failure() {
        let config = Configuration::default();
        // Both required folders are empty; only the source folder is reported
        assert_eq!(config.validate(), Err(ValidationError::MissingSourceFolder));
    }

    #[test]
    fn test_validate_missing_staging() {
        let temp = TempDir::new().unwrap();
        let mut config = valid_config(&temp);
        config.staging_area = Utf8PathBuf::new();
        assert_eq!(config.validate(), Err(ValidationError::MissingStagingArea));
    }

    #[test]
    fn test_validate_nonexistent_source() {
        let temp = TempDir::new().unwrap();
        let mut config = valid_config(&temp);
        config.source_folder = config.source_folder.join("does-not-exist");

        let err = config.validate().unwrap_err();
        assert!(err.is_source_missing());
        assert!(err.to_string().contains("does-not-exist"));
    }

    #[test]
    fn test_validate_missing_pattern_file() {
        let temp = TempDir::new().unwrap();
        let mut config = valid_config(&temp);
        config.pattern_mapping_file = Some(config.source_folder.join("patterns.xml"));

        assert!(matches!(
            config.validate(),
            Err(ValidationError::PatternFileNotFound(_))
        ));
    }

    #[test]
    fn test_validate_numeric_bounds() {
        let temp = TempDir::new().unwrap();

        let mut config = valid_config(&temp);
        config.open_file_timeout = 0;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::OutOfRange { field: "open_file_timeout", .. })
        ));

        let mut config = valid_config(&temp);
        config.min_text_confidence = 95;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::OutOfRange { field: "min_text_confidence", .. })
        ));

        let mut config = valid_config(&temp);
        config.enhance_contrast = f64::NAN;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::OutOfRange { field: "enhance_contrast", .. })
        ));
    }

    #[test]
    fn test_validate_dpi_order() {
        let temp = TempDir::new().unwrap();
        let mut config = valid_config(&temp);
        config.dpi_min = 400;
        config.dpi_max = 300;
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidDpiRange { min: 400, max: 300 })
        );
    }

    #[test]
    fn test_apply_processing_mode() {
        let mut config = Configuration::default();

        config.apply_processing_mode(ProcessingMode::Fast);
        assert!(!config.adaptive_dpi);
        assert!(!config.detect_regions);
        assert_eq!(config.processing_mode, ProcessingMode::Fast);

        config.apply_processing_mode(ProcessingMode::HighQuality);
        assert!(config.adaptive_dpi);
        assert_eq!(config.dpi_max, 600);
        assert_eq!(config.enhance_contrast, 2.0);
        assert_eq!(config.enhance_sharpness, 2.0);
    }

    #[test]
    fn test_processing_mode_from_str() {
        assert_eq!("fast".parse(), Ok(ProcessingMode::Fast));
        assert_eq!("High-Quality".parse(), Ok(ProcessingMode::HighQuality));
        assert!("turbo".parse::<ProcessingMode>().is_err());
    }

    #[test]
    fn test_output_folders_skip_unset() {
        let mut config = Configuration::default();
        config.staging_area = Utf8PathBuf::from("/data/staging");
        config.log_folder = Some(Utf8PathBuf::from("/data/logs"));

        let folders = config.output_folders();
        assert_eq!(folders.len(), 2);
        assert_eq!(folders[1], Utf8Path::new("/data/logs"));
    }

    #[test]
    fn test_processing_timeout_disabled_by_default() {
        let mut config = Configuration::default();
        assert!(config.processing_timeout_duration().is_none());

        config.processing_timeout_enabled = true;
        config.processing_timeout = 1.5;
        assert_eq!(config.processing_timeout_duration(), Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let config: Configuration =
            serde_yaml_ng::from_str("name: Legacy\nsource_folder: /in\n").unwrap();
        assert_eq!(config.name, "Legacy");
        assert_eq!(config.source_folder, Utf8PathBuf::from("/in"));
        assert_eq!(config.dpi_max, 500);
        assert!(config.log_folder.is_none());
    }

    #[test]
    fn test_legacy_keys_accepted() {
        let config: Configuration = serde_yaml_ng::from_str(
            "object_id_from_vnet: true\nals_retry_timeout: 45\nlog_folder: ''\n",
        )
        .unwrap();
        assert!(config.object_id_from_source);
        assert_eq!(config.retry_timeout, 45);
        assert!(config.log_folder.is_none());
    }
}
