use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};

use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use eth_keystore::decrypt_key;
use haiku_core::Address;
use rpassword::prompt_password;

#[derive(Clone, Debug)]
pub struct WalletDescriptor {
    pub name: String,
    pub path: PathBuf,
}

impl WalletDescriptor {
    pub fn new(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }
}

/// A keystore whose password has been verified, together with the account
/// address it controls. The key material itself stays inside the wallet
/// gateway; the client only needs the address.
#[derive(Clone, Debug)]
pub struct UnlockedWallet {
    pub name: String,
    pub address: Address,
}

pub fn default_wallet_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".haiku").join("keystores"))
}

pub fn resolve_wallet_dir(dir: Option<&str>) -> Result<PathBuf> {
    match dir {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            Ok(PathBuf::from(expanded.into_owned()))
        }
        None => default_wallet_dir(),
    }
}

pub fn list_wallets(dir: &Path) -> Result<Vec<WalletDescriptor>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut wallets = Vec::new();
    for entry in fs::read_dir(dir).wrap_err("Failed to read wallet directory")? {
        let entry = entry.wrap_err("Failed to read wallet entry")?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| eyre!("Invalid wallet filename {:?}", path))?
            .to_owned();
        wallets.push(WalletDescriptor::new(name, path));
    }
    wallets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(wallets)
}

pub fn find_wallet(dir: &Path, name: &str) -> Result<WalletDescriptor> {
    let wallets = list_wallets(dir)?;
    wallets
        .into_iter()
        .find(|w| w.name == name)
        .ok_or_else(|| eyre!("Wallet '{name}' not found in {}", dir.to_string_lossy()))
}

/// Prompts for the keystore password, verifies it by decrypting, and reads
/// the account address from the keystore file.
pub fn unlock_wallet(descriptor: &WalletDescriptor) -> Result<UnlockedWallet> {
    let prompt = format!("Enter password for wallet '{}': ", descriptor.name);
    let password = prompt_password(prompt).wrap_err("Failed to read wallet password")?;

    decrypt_key(&descriptor.path, password.as_bytes())
        .map_err(|_| eyre!("Invalid password for wallet '{}'", descriptor.name))?;

    let address = keystore_address(&descriptor.path).wrap_err_with(|| {
        format!("Wallet '{}' has no readable address", descriptor.name)
    })?;

    Ok(UnlockedWallet {
        name: descriptor.name.clone(),
        address,
    })
}

/// Reads the `address` field a v3 keystore file carries alongside the
/// encrypted key.
fn keystore_address(path: &Path) -> Result<Address> {
    let data = fs::read(path).wrap_err("Failed to read keystore file")?;
    let json: serde_json::Value =
        serde_json::from_slice(&data).wrap_err("Keystore file is not valid JSON")?;
    let raw = json
        .get("address")
        .and_then(|v| v.as_str())
        .ok_or_else(|| eyre!("Keystore file has no address field"))?;
    let prefixed = if raw.starts_with("0x") || raw.starts_with("0X") {
        raw.to_string()
    } else {
        format!("0x{raw}")
    };
    prefixed
        .parse()
        .map_err(|e| eyre!("Keystore address is malformed: {e}"))
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "haiku-wallets-{tag}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn list_wallets__finds_only_json_keystores_sorted_by_name() {
        // given
        let dir = temp_dir("list");
        fs::write(dir.join("zeta.json"), "{}").unwrap();
        fs::write(dir.join("alpha.json"), "{}").unwrap();
        fs::write(dir.join("notes.txt"), "nope").unwrap();

        // when
        let wallets = list_wallets(&dir).unwrap();

        // then
        let names: Vec<&str> = wallets.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn list_wallets__returns_empty_for_a_missing_directory() {
        let missing = std::env::temp_dir().join("haiku-wallets-does-not-exist");
        assert!(list_wallets(&missing).unwrap().is_empty());
    }

    #[test]
    fn keystore_address__prefixes_and_validates_the_stored_address() {
        // given a keystore that stores the address unprefixed, as geth does
        let dir = temp_dir("addr");
        let path = dir.join("main.json");
        fs::write(
            &path,
            r#"{"address": "1234567890ABCDEF1234567890abcdef12345678", "crypto": {}}"#,
        )
        .unwrap();

        // when
        let address = keystore_address(&path).unwrap();

        // then
        assert_eq!(
            address.as_str(),
            "0x1234567890abcdef1234567890abcdef12345678"
        );

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn keystore_address__fails_without_an_address_field() {
        let dir = temp_dir("noaddr");
        let path = dir.join("broken.json");
        fs::write(&path, r#"{"crypto": {}}"#).unwrap();

        assert!(keystore_address(&path).is_err());

        let _ = fs::remove_dir_all(&dir);
    }
}
