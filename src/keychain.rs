use keyring::Entry;
use tracing::{info, warn};

use crate::assistant::Provider;
use crate::error::{DeskError, DeskResult};

const KEYCHAIN_USER: &str = "sinapsis-desk";

fn entry_for(provider: Provider) -> DeskResult<Entry> {
    let service = provider.keychain_service();
    Entry::new(&service, KEYCHAIN_USER).map_err(|e| {
        warn!("Failed to create keyring entry for {}: {}", service, e);
        DeskError::Keychain(e.to_string())
    })
}

pub fn set_api_key(provider: Provider, key: &str) -> DeskResult<()> {
    info!("Setting API key for provider: {}", provider);
    entry_for(provider)?.set_password(key.trim()).map_err(|e| {
        warn!("Failed to set password for {}: {}", provider, e);
        DeskError::Keychain(e.to_string())
    })
}

/// `Ok(None)` when no key has been stored yet.
pub fn get_api_key(provider: Provider) -> DeskResult<Option<String>> {
    match entry_for(provider)?.get_password() {
        Ok(password) => Ok(Some(password)),
        Err(keyring::Error::NoEntry) => {
            info!("No API key found for provider: {}", provider);
            Ok(None)
        }
        Err(e) => {
            warn!("Failed to get password for {}: {}", provider, e);
            Err(DeskError::Keychain(e.to_string()))
        }
    }
}

pub fn delete_api_key(provider: Provider) -> DeskResult<()> {
    info!("Deleting API key for provider: {}", provider);
    match entry_for(provider)?.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => {
            warn!("Failed to delete credential for {}: {}", provider, e);
            Err(DeskError::Keychain(e.to_string()))
        }
    }
}
