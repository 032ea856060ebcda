//! Emergency contacts and the user profile.
//!
//! [`ContactBook`] owns the in-memory contact list and profile and mirrors
//! every change into the [`Store`]. The first load seeds defaults and records
//! that it did so; later loads never re-seed, even when the user has emptied
//! the list.

use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::config::FeatureConfig;
use crate::error::{Error, Result};
use crate::model::{default_contacts, Contact, UserProfile};
use crate::store::{
    Store, CONTACTS_INITIALIZED_KEY, CONTACTS_KEY, PROFILE_INITIALIZED_KEY, PROFILE_KEY,
};
use crate::ui::Ui;

/// Name stored when the profile is saved without one.
pub const DEFAULT_PROFILE_NAME: &str = "User";

/// A contact book shared between the front end and the dispatcher.
pub type SharedContactBook = Arc<Mutex<ContactBook>>;

/// The device's contacts and profile.
#[derive(Debug)]
pub struct ContactBook {
    store: Store,
    features: FeatureConfig,
    ui: Arc<dyn Ui>,
    contacts: Vec<Contact>,
    profile: UserProfile,
}

impl ContactBook {
    /// Create an empty book over `store`. Call [`ContactBook::load`] next.
    #[must_use]
    pub fn new(store: Store, features: FeatureConfig, ui: Arc<dyn Ui>) -> Self {
        Self {
            store,
            features,
            ui,
            contacts: Vec::new(),
            profile: UserProfile::default(),
        }
    }

    /// Create a book and load it from `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub fn open(store: Store, features: FeatureConfig, ui: Arc<dyn Ui>) -> Result<Self> {
        let mut book = Self::new(store, features, ui);
        book.load()?;
        Ok(book)
    }

    /// Wrap the book for sharing with the dispatcher.
    #[must_use]
    pub fn into_shared(self) -> SharedContactBook {
        Arc::new(Mutex::new(self))
    }

    /// Load contacts and profile, seeding defaults on first run, then render.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub fn load(&mut self) -> Result<()> {
        self.restore()?;
        self.render();
        Ok(())
    }

    /// Load contacts and profile without rendering them.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub fn restore(&mut self) -> Result<()> {
        self.load_contacts()?;
        self.load_profile()
    }

    fn load_contacts(&mut self) -> Result<()> {
        let first_run = !self.store.flag(CONTACTS_INITIALIZED_KEY)?;

        if first_run && self.features.auto_load_default_contacts {
            self.contacts = default_contacts();
            self.store.set_json(CONTACTS_KEY, &self.contacts)?;
            self.store.set_flag(CONTACTS_INITIALIZED_KEY)?;
            info!(count = self.contacts.len(), "Default contacts loaded");
        } else if let Some(saved) = self.store.get_json(CONTACTS_KEY)? {
            self.contacts = saved;
            debug!(count = self.contacts.len(), "Contacts loaded");
        } else {
            self.contacts = default_contacts();
            debug!("No saved contacts, using defaults");
        }
        Ok(())
    }

    fn load_profile(&mut self) -> Result<()> {
        let first_run = !self.store.flag(PROFILE_INITIALIZED_KEY)?;

        if first_run {
            self.profile = UserProfile::default();
            self.store.set_json(PROFILE_KEY, &self.profile)?;
            self.store.set_flag(PROFILE_INITIALIZED_KEY)?;
            info!("Default profile loaded");
        } else {
            self.profile = self.store.get_json(PROFILE_KEY)?.unwrap_or_default();
        }
        Ok(())
    }

    /// The contacts in insertion order.
    #[must_use]
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    /// The user profile.
    #[must_use]
    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    /// Number of contacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    /// Check whether there are no contacts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// Append a contact.
    ///
    /// Both fields are trimmed. The phone must carry a country code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContact`] (after warning the user) if a field is
    /// empty or the phone does not start with `+`, or an error if contact
    /// management is disabled or the store cannot be written.
    pub fn add_contact(&mut self, name: &str, phone: &str) -> Result<&Contact> {
        self.ensure_contact_management()?;

        let name = name.trim();
        let phone = phone.trim();

        if name.is_empty() || phone.is_empty() {
            return Err(self.reject("Please enter both name and phone number"));
        }
        if !phone.starts_with('+') {
            return Err(self.reject("Please include country code (e.g., +919876543210)"));
        }

        self.contacts.push(Contact::new(name, phone));
        self.save_contacts()?;
        info!(contact = name, "Emergency contact added");
        self.ui
            .status(&format!("✅ {name} added as emergency contact"));

        let index = self.contacts.len() - 1;
        Ok(&self.contacts[index])
    }

    /// Remove the contact at `index` once the user confirms.
    ///
    /// Returns the removed contact, or `None` if the user declined.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ContactIndex`] if there is no such contact, or an error
    /// if contact management is disabled or the store cannot be written.
    pub fn remove_contact(&mut self, index: usize) -> Result<Option<Contact>> {
        self.ensure_contact_management()?;

        let Some(contact) = self.contacts.get(index) else {
            return Err(Error::ContactIndex {
                index,
                len: self.contacts.len(),
            });
        };

        let question = format!("Remove {} from emergency contacts?", contact.name);
        if !self.ui.confirm(&question) {
            return Ok(None);
        }

        let removed = self.contacts.remove(index);
        self.save_contacts()?;
        info!(contact = %removed.name, "Emergency contact removed");
        Ok(Some(removed))
    }

    /// Replace the contacts with the defaults once the user confirms.
    ///
    /// The first-run flag is left untouched. Returns `false` if declined.
    ///
    /// # Errors
    ///
    /// Returns an error if contact management is disabled or the store cannot
    /// be written.
    pub fn reset_contacts(&mut self) -> Result<bool> {
        self.ensure_contact_management()?;

        if !self
            .ui
            .confirm("Reset to default emergency contacts? This will replace all current contacts.")
        {
            return Ok(false);
        }

        self.contacts = default_contacts();
        self.save_contacts()?;
        self.ui.status("✅ Contacts reset to defaults");
        Ok(true)
    }

    /// Save the profile from user-entered fields.
    ///
    /// Every field is trimmed; an empty name becomes `"User"`.
    ///
    /// # Errors
    ///
    /// Returns an error if profile editing is disabled or the store cannot be
    /// written.
    pub fn save_profile(&mut self, fields: UserProfile) -> Result<&UserProfile> {
        self.ensure_profile_editing()?;

        let name = fields.name.trim();
        self.profile = UserProfile {
            name: if name.is_empty() {
                DEFAULT_PROFILE_NAME.to_string()
            } else {
                name.to_string()
            },
            blood_type: fields.blood_type.trim().to_string(),
            medical_info: fields.medical_info.trim().to_string(),
            emergency_note: fields.emergency_note.trim().to_string(),
        };

        self.save_profile_state()?;
        self.ui.status("✅ Profile saved successfully!");
        Ok(&self.profile)
    }

    /// Replace the profile with the default once the user confirms.
    ///
    /// The first-run flag is left untouched. Returns `false` if declined.
    ///
    /// # Errors
    ///
    /// Returns an error if profile editing is disabled or the store cannot be
    /// written.
    pub fn reset_profile(&mut self) -> Result<bool> {
        self.ensure_profile_editing()?;

        if !self.ui.confirm("Reset profile to default settings?") {
            return Ok(false);
        }

        self.profile = UserProfile::default();
        self.save_profile_state()?;
        self.ui.status("✅ Profile reset to defaults");
        Ok(true)
    }

    /// Show contacts and profile on the front end.
    pub fn render(&self) {
        self.ui.render_contacts(&self.contacts);
        self.ui.render_profile(&self.profile);
    }

    fn save_contacts(&self) -> Result<()> {
        self.store.set_json(CONTACTS_KEY, &self.contacts)?;
        self.ui.render_contacts(&self.contacts);
        Ok(())
    }

    fn save_profile_state(&self) -> Result<()> {
        self.store.set_json(PROFILE_KEY, &self.profile)?;
        self.ui.render_profile(&self.profile);
        Ok(())
    }

    fn reject(&self, reason: &str) -> Error {
        self.ui.warn(reason);
        Error::invalid_contact(reason)
    }

    fn ensure_contact_management(&self) -> Result<()> {
        if self.features.allow_contact_management {
            Ok(())
        } else {
            Err(Error::FeatureDisabled {
                feature: "contact management",
            })
        }
    }

    fn ensure_profile_editing(&self) -> Result<()> {
        if self.features.allow_profile_editing {
            Ok(())
        } else {
            Err(Error::FeatureDisabled {
                feature: "profile editing",
            })
        }
    }
}
