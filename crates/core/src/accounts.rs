//! Patient and doctor accounts, and the doctor directory.

use crate::ids::UserId;
use crate::model::{DoctorProfile, Role, UserAccount};
use crate::store::RecordStore;
use crate::{CoreError, CoreResult};
use chrono::Utc;
use riskcare_types::NonEmptyText;
use std::sync::Arc;

/// Fields supplied when registering an account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub role: Role,
    /// Required for doctors, rejected for patients.
    pub doctor_profile: Option<DoctorProfile>,
}

/// Directory entry seeded into an empty installation.
struct SeedDoctor {
    name: &'static str,
    specialization: &'static str,
    experience_years: u32,
    hospital: &'static str,
    contact: &'static str,
}

const SEED_DOCTORS: [SeedDoctor; 5] = [
    SeedDoctor {
        name: "Sarah Jenkins",
        specialization: "Cardiologist",
        experience_years: 12,
        hospital: "City Heart Institute",
        contact: "+1-555-0123",
    },
    SeedDoctor {
        name: "Michael Chen",
        specialization: "Endocrinologist",
        experience_years: 8,
        hospital: "Metabolic Health Center",
        contact: "+1-555-0124",
    },
    SeedDoctor {
        name: "Emily Sharma",
        specialization: "General Physician",
        experience_years: 15,
        hospital: "Community Wellness Clinic",
        contact: "+1-555-0125",
    },
    SeedDoctor {
        name: "David Ross",
        specialization: "Cardiologist",
        experience_years: 20,
        hospital: "St. Mary's Hospital",
        contact: "+1-555-0126",
    },
    SeedDoctor {
        name: "Anita Patel",
        specialization: "Diabetologist",
        experience_years: 10,
        hospital: "Sugar Care Clinic",
        contact: "+1-555-0127",
    },
];

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn RecordStore>,
}

impl AccountService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Registers a new account.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidInput`] for a blank username, an email without `@`, or a profile
    ///   that does not match the role
    /// - [`CoreError::UsernameTaken`] / [`CoreError::LicenceTaken`] on uniqueness conflicts
    pub fn register(&self, account: NewAccount) -> CoreResult<UserAccount> {
        let username = NonEmptyText::new(&account.username)
            .map_err(|_| CoreError::InvalidInput("username cannot be empty".into()))?;
        if username.as_str().contains(char::is_whitespace) {
            return Err(CoreError::InvalidInput(
                "username cannot contain whitespace".into(),
            ));
        }
        let email = NonEmptyText::new(&account.email)
            .map_err(|_| CoreError::InvalidInput("email cannot be empty".into()))?;
        if !email.as_str().contains('@') {
            return Err(CoreError::InvalidInput(format!(
                "invalid email address: {}",
                email
            )));
        }

        match (account.role, &account.doctor_profile) {
            (Role::Doctor, None) => {
                return Err(CoreError::InvalidInput(
                    "doctor accounts require a doctor profile".into(),
                ))
            }
            (Role::Patient, Some(_)) => {
                return Err(CoreError::InvalidInput(
                    "patient accounts cannot carry a doctor profile".into(),
                ))
            }
            _ => {}
        }

        let user = UserAccount {
            id: UserId::new(),
            username,
            email,
            role: account.role,
            doctor_profile: account.doctor_profile,
            created_at: Utc::now(),
        };
        self.store.insert_user(&user)?;
        tracing::info!("registered {} account {} ({})", user.role, user.username, user.id);
        Ok(user)
    }

    pub fn get(&self, id: UserId) -> CoreResult<UserAccount> {
        self.store
            .get_user(id)?
            .ok_or_else(|| CoreError::not_found("user", id))
    }

    pub fn find_by_username(&self, username: &str) -> CoreResult<Option<UserAccount>> {
        self.store.find_user_by_username(username)
    }

    /// Doctor accounts in registration order, optionally only verified ones.
    pub fn list_doctors(&self, verified_only: bool) -> CoreResult<Vec<UserAccount>> {
        Ok(self
            .store
            .list_users(Some(Role::Doctor))?
            .into_iter()
            .filter(|d| {
                !verified_only || d.doctor_profile.as_ref().is_some_and(|p| p.verified)
            })
            .collect())
    }

    /// Populates the directory with the built-in doctors.
    ///
    /// Does nothing when any doctor account already exists. Returns how many were created.
    pub fn seed_doctors(&self) -> CoreResult<usize> {
        if !self.store.list_users(Some(Role::Doctor))?.is_empty() {
            tracing::info!("doctors already exist; skipping seed");
            return Ok(0);
        }

        for seed in &SEED_DOCTORS {
            let slug = seed.name.to_ascii_lowercase().replace(' ', ".");
            let profile = DoctorProfile {
                display_name: Some(NonEmptyText::new(format!("Dr. {}", seed.name))?),
                specialization: NonEmptyText::new(seed.specialization)?,
                experience_years: seed.experience_years,
                hospital: NonEmptyText::new(seed.hospital)?,
                contact_number: NonEmptyText::new(seed.contact)?,
                licence_number: None,
                verified: true,
            };
            self.register(NewAccount {
                username: format!("dr.{}", slug),
                email: format!("{}@riskcare.example", slug),
                role: Role::Doctor,
                doctor_profile: Some(profile),
            })?;
        }
        tracing::info!("seeded {} doctors", SEED_DOCTORS.len());
        Ok(SEED_DOCTORS.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service() -> AccountService {
        AccountService::new(Arc::new(MemoryStore::new()))
    }

    fn patient(username: &str) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            role: Role::Patient,
            doctor_profile: None,
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let accounts = service();
        let alice = accounts.register(patient("alice")).unwrap();
        assert_eq!(accounts.get(alice.id).unwrap(), alice);
        assert_eq!(
            accounts.find_by_username("alice").unwrap().map(|u| u.id),
            Some(alice.id)
        );
        assert!(matches!(
            accounts.register(patient("alice")),
            Err(CoreError::UsernameTaken(_))
        ));
        assert!(matches!(
            accounts.get(UserId::new()),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_register_validation() {
        let accounts = service();
        let mut bad_email = patient("bob");
        bad_email.email = "bob".into();
        assert!(matches!(
            accounts.register(bad_email),
            Err(CoreError::InvalidInput(_))
        ));

        let mut doctor_without_profile = patient("drno");
        doctor_without_profile.role = Role::Doctor;
        assert!(matches!(
            accounts.register(doctor_without_profile),
            Err(CoreError::InvalidInput(_))
        ));

        assert!(matches!(
            accounts.register(patient("two words")),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_seed_doctors_once() {
        let accounts = service();
        assert_eq!(accounts.seed_doctors().unwrap(), 5);
        assert_eq!(accounts.seed_doctors().unwrap(), 0);

        let doctors = accounts.list_doctors(false).unwrap();
        assert_eq!(doctors.len(), 5);
        let sarah = accounts
            .find_by_username("dr.sarah.jenkins")
            .unwrap()
            .unwrap();
        let profile = sarah.doctor_profile.unwrap();
        assert_eq!(profile.specialization.as_str(), "Cardiologist");
        assert_eq!(profile.experience_years, 12);
        assert_eq!(profile.hospital.as_str(), "City Heart Institute");
        assert_eq!(profile.contact_number.as_str(), "+1-555-0123");
    }

    #[test]
    fn test_list_doctors_verified_only() {
        let accounts = service();
        accounts.register(patient("alice")).unwrap();
        accounts
            .register(NewAccount {
                username: "drnew".into(),
                email: "drnew@example.com".into(),
                role: Role::Doctor,
                doctor_profile: Some(DoctorProfile {
                    display_name: None,
                    specialization: NonEmptyText::new("Cardiologist").unwrap(),
                    experience_years: 1,
                    hospital: NonEmptyText::new("General").unwrap(),
                    contact_number: NonEmptyText::new("+1-555-0199").unwrap(),
                    licence_number: Some(NonEmptyText::new("LIC-9").unwrap()),
                    verified: false,
                }),
            })
            .unwrap();

        assert_eq!(accounts.list_doctors(false).unwrap().len(), 1);
        assert!(accounts.list_doctors(true).unwrap().is_empty());
    }
}
