//! Alias-Registry – bijektive Zuordnung Alias <-> Adresse
//!
//! Zwei HashMaps hinter einem einzigen RwLock. Schreibende Operationen
//! aendern immer beide Richtungen im selben kritischen Abschnitt, Leser sehen
//! daher nie ein halb aktualisiertes Paar.

use std::collections::HashMap;

use ipcall_core::{Address, Alias};
use parking_lot::RwLock;

/// Anfangskapazitaet beider Maps
pub const STANDARD_KAPAZITAET: usize = 1000;

#[derive(Debug, Default)]
struct Maps {
    nach_alias: HashMap<Alias, Address>,
    nach_adresse: HashMap<Address, Alias>,
}

impl Maps {
    /// Fuegt das Paar ein und entfernt veraltete Gegenrichtungen
    fn einfuegen(&mut self, alias: Alias, adresse: Address) {
        if let Some(alte_adresse) = self.nach_alias.remove(&alias) {
            self.nach_adresse.remove(&alte_adresse);
        }
        if let Some(alter_alias) = self.nach_adresse.remove(&adresse) {
            self.nach_alias.remove(&alter_alias);
        }
        self.nach_alias.insert(alias.clone(), adresse.clone());
        self.nach_adresse.insert(adresse, alias);
    }
}

#[derive(Debug)]
pub struct AliasRegistry {
    maps: RwLock<Maps>,
}

impl Default for AliasRegistry {
    fn default() -> Self {
        Self::mit_kapazitaet(STANDARD_KAPAZITAET)
    }
}

impl AliasRegistry {
    pub fn neu() -> Self {
        Self::default()
    }

    pub fn mit_kapazitaet(kapazitaet: usize) -> Self {
        Self {
            maps: RwLock::new(Maps {
                nach_alias: HashMap::with_capacity(kapazitaet),
                nach_adresse: HashMap::with_capacity(kapazitaet),
            }),
        }
    }

    /// Fuegt beide Richtungen ein (letzter Schreiber gewinnt)
    ///
    /// Besass der Alias oder die Adresse bereits einen Partner, wird das alte
    /// Paar vollstaendig entfernt.
    pub fn add(&self, alias: Alias, adresse: Address) {
        self.maps.write().einfuegen(alias, adresse);
    }

    /// Fuegt nur ein, wenn der Alias noch frei ist; atomar unter dem Schreib-Lock
    pub fn try_add(&self, alias: Alias, adresse: Address) -> bool {
        let mut maps = self.maps.write();
        if maps.nach_alias.contains_key(&alias) {
            return false;
        }
        maps.einfuegen(alias, adresse);
        true
    }

    pub fn get_by_alias(&self, alias: &str) -> Option<Address> {
        self.maps.read().nach_alias.get(alias).cloned()
    }

    pub fn get_by_address(&self, adresse: &Address) -> Option<Alias> {
        self.maps.read().nach_adresse.get(adresse).cloned()
    }

    /// Entfernt beide Richtungen; kein Effekt wenn der Alias fehlt
    pub fn delete(&self, alias: &str) {
        let mut maps = self.maps.write();
        if let Some(adresse) = maps.nach_alias.remove(alias) {
            maps.nach_adresse.remove(&adresse);
        }
    }

    /// Entfernt den Alias nur, wenn er auf `adresse` zeigt
    pub fn delete_if_owned(&self, alias: &str, adresse: &Address) -> bool {
        let mut maps = self.maps.write();
        if maps.nach_alias.get(alias) != Some(adresse) {
            return false;
        }
        maps.nach_alias.remove(alias);
        maps.nach_adresse.remove(adresse);
        true
    }

    pub fn len(&self) -> usize {
        self.maps.read().nach_alias.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Prueft die Bijektion (beide Richtungen gleich gross und deckungsgleich)
    pub fn ist_konsistent(&self) -> bool {
        let maps = self.maps.read();
        maps.nach_alias.len() == maps.nach_adresse.len()
            && maps
                .nach_alias
                .iter()
                .all(|(alias, adresse)| maps.nach_adresse.get(adresse) == Some(alias))
    }
}
