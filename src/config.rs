use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::ContextError;

fn default_request_timeout_seconds() -> u64 {
    30
}

fn default_output_directory() -> PathBuf {
    PathBuf::from(".")
}

/// The settings of the application, read from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfiguration {
    #[serde(default)]
    pub identity_client_id: Option<String>,
    #[serde(default)]
    pub identity_client_secret: Option<String>,
    #[serde(default)]
    pub session_secret: Option<String>,
    #[serde(default)]
    pub maps_api_key: Option<String>,
    /// The service account file used to store the contracts.
    #[serde(default)]
    pub storage_credentials_path: Option<PathBuf>,
    #[serde(default)]
    pub storage_folder_id: Option<String>,
    #[serde(default)]
    pub email_api_key: Option<String>,
    /// The public address of the forms, used in the signing links.
    #[serde(default)]
    pub app_url: Option<String>,
    #[serde(default)]
    pub bridge_base_url: Option<String>,
    #[serde(default)]
    pub bridge_token: Option<String>,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    #[serde(default)]
    pub body_typeface_path: Option<PathBuf>,
    #[serde(default)]
    pub cursive_typeface_path: Option<PathBuf>,
    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,
}

impl AppConfiguration {
    pub fn from_path(configuration_path: &Path) -> Result<Self, ContextError> {
        let configuration_contents =
            std::fs::read_to_string(configuration_path).map_err(|error| {
                ContextError::with_error(
                    format!("Unable to read the configuration {:?}", configuration_path),
                    &error,
                )
            })?;
        let configuration: AppConfiguration = serde_json::from_str(&configuration_contents)
            .map_err(|error| {
                ContextError::with_error(
                    format!("Unable to parse the configuration {:?}", configuration_path),
                    &error,
                )
            })?;

        Ok(configuration)
    }

    /// Checks that every required key is present, reporting all the missing ones at once.
    pub fn validate(&self) -> Result<(), ContextError> {
        let is_missing = |value: &Option<String>| {
            value.as_deref().map_or(true, |value| value.trim().is_empty())
        };
        let required_keys = [
            ("identityClientId", is_missing(&self.identity_client_id)),
            ("identityClientSecret", is_missing(&self.identity_client_secret)),
            ("sessionSecret", is_missing(&self.session_secret)),
            ("mapsApiKey", is_missing(&self.maps_api_key)),
            ("storageCredentialsPath", self.storage_credentials_path.is_none()),
            ("storageFolderId", is_missing(&self.storage_folder_id)),
            ("emailApiKey", is_missing(&self.email_api_key)),
            ("appUrl", is_missing(&self.app_url)),
            ("bridgeBaseUrl", is_missing(&self.bridge_base_url)),
        ];
        let missing_keys: Vec<&str> = required_keys
            .into_iter()
            .filter_map(|(key, missing)| missing.then_some(key))
            .collect();

        if !missing_keys.is_empty() {
            return Err(ContextError::with_context(format!(
                "Missing required configuration keys: {}",
                missing_keys.join(", ")
            )));
        }
        if self.request_timeout_seconds == 0 {
            return Err(ContextError::with_context(
                "The request timeout must be of at least one second",
            ));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_configuration() -> serde_json::Value {
        serde_json::json!({
            "identityClientId": "client",
            "identityClientSecret": "secret",
            "sessionSecret": "session",
            "mapsApiKey": "maps",
            "storageCredentialsPath": "credentials.json",
            "storageFolderId": "folder",
            "emailApiKey": "email",
            "appUrl": "https://forms.example.com",
            "bridgeBaseUrl": "https://forms.example.com/api",
        })
    }

    #[test]
    fn defaults_are_applied() {
        let configuration: AppConfiguration =
            serde_json::from_value(complete_configuration()).unwrap();

        assert!(configuration.validate().is_ok());
        assert_eq!(configuration.request_timeout(), Duration::from_secs(30));
        assert_eq!(configuration.output_directory, PathBuf::from("."));
    }

    #[test]
    fn every_missing_key_is_reported() {
        let mut values = complete_configuration();
        let entries = values.as_object_mut().unwrap();
        entries.remove("sessionSecret");
        entries.remove("emailApiKey");
        entries.insert("mapsApiKey".into(), "  ".into());
        let configuration: AppConfiguration = serde_json::from_value(values).unwrap();

        let error = configuration.validate().unwrap_err();
        assert_eq!(
            error.to_string(),
            "Missing required configuration keys: sessionSecret, mapsApiKey, emailApiKey"
        );
    }

    #[test]
    fn unreadable_configuration_names_the_file() {
        let error = AppConfiguration::from_path(Path::new("/nonexistent/contractr.json"))
            .unwrap_err();
        assert!(error.to_string().contains("contractr.json"));
    }
}
