//! Flashcard sets, folders and the association between them.
//!
//! Reads degrade to an empty result and a logged error. Mutations return
//! their error so the caller can tell the user that the change failed.

use super::{ProfileStore, StoreError};
use crate::database::db::timestamp;
use crate::database::{
    Backend, BackendError, Collection, Filter, Query, Record, from_record, from_records,
    to_record,
};
use crate::models::folder::{DEFAULT_FOLDER_COLOR, DEFAULT_FOLDER_ICON};
use crate::models::{
    Flashcard, FlashcardSet, Folder, FolderSummary, FolderUpdate, NewFolder, NewSet,
    RecentActivity, SetSummary, SetUpdate, UserProfile,
};
use chrono::Utc;
use log::{error, info};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

const RECENT_ACTIVITY_LIMIT: usize = 10;

#[derive(Serialize)]
struct SetRow<'a> {
    user_id: &'a str,
    title: &'a str,
    description: Option<&'a str>,
    folder_id: Option<&'a str>,
    total_cards: usize,
    is_public: bool,
}

#[derive(Serialize)]
struct CardRow<'a> {
    set_id: &'a str,
    term: &'a str,
    definition: &'a str,
    position: usize,
    is_starred: bool,
}

#[derive(Serialize)]
struct FolderRow<'a> {
    user_id: &'a str,
    name: &'a str,
    description: Option<&'a str>,
    icon: &'a str,
    color: &'a str,
}

fn stamped(mut patch: Record, field: &str) -> Record {
    patch.insert(field.to_string(), Value::String(timestamp(Utc::now())));
    patch
}

fn single(field: &str, value: Value) -> Record {
    let mut patch = Record::new();
    patch.insert(field.to_string(), value);
    patch
}

pub struct SetStore {
    backend: Arc<dyn Backend>,
    profiles: Arc<ProfileStore>,
    sets: Vec<FlashcardSet>,
    folders: Vec<Folder>,
    current_set: Option<FlashcardSet>,
    recent_activities: Vec<RecentActivity>,
}

impl SetStore {
    pub fn new(backend: Arc<dyn Backend>, profiles: Arc<ProfileStore>) -> Self {
        Self {
            backend,
            profiles,
            sets: Vec::new(),
            folders: Vec::new(),
            current_set: None,
            recent_activities: Vec::new(),
        }
    }

    pub fn sets(&self) -> &[FlashcardSet] {
        &self.sets
    }

    pub fn folders(&self) -> &[Folder] {
        &self.folders
    }

    pub fn current_set(&self) -> Option<&FlashcardSet> {
        self.current_set.as_ref()
    }

    pub fn recent_activities(&self) -> &[RecentActivity] {
        &self.recent_activities
    }

    /// Attaches the folder summary and the position-ordered cards.
    fn hydrate(&self, mut set: FlashcardSet) -> Result<FlashcardSet, BackendError> {
        set.folder = match &set.folder_id {
            Some(folder_id) => match self
                .backend
                .fetch_one(Collection::Folders, &Filter::by_id(folder_id))
            {
                Ok(row) => Some(from_record::<FolderSummary>(row)?),
                Err(BackendError::NotFound) => None,
                Err(e) => return Err(e),
            },
            None => None,
        };

        let cards = Query::new(Filter::new().eq("set_id", set.id.as_str())).order_by("position", false);
        set.flashcards = from_records(self.backend.fetch(Collection::Flashcards, &cards)?)?;
        set.sort_cards();
        Ok(set)
    }

    fn fetch_sets(&self, owner: Option<&str>) -> Result<Vec<FlashcardSet>, BackendError> {
        let mut filter = Filter::new();
        if let Some(owner) = owner {
            filter = filter.eq("user_id", owner);
        }
        let query = Query::new(filter).order_by("created_at", true);

        from_records::<FlashcardSet>(self.backend.fetch(Collection::FlashcardSets, &query)?)?
            .into_iter()
            .map(|set| self.hydrate(set))
            .collect()
    }

    /// Loads sets newest first, all owners when `owner` is `None`.
    pub fn load_sets(&mut self, owner: Option<&str>) -> Vec<FlashcardSet> {
        match self.fetch_sets(owner) {
            Ok(sets) => {
                self.sets = sets.clone();
                sets
            }
            Err(e) => {
                error!("Error loading flashcard sets: {e}");
                Vec::new()
            }
        }
    }

    fn fetch_recent_activities(&self) -> Result<Vec<RecentActivity>, BackendError> {
        let query = Query::new(Filter::new().eq("is_public", true))
            .order_by("last_studied_at", true)
            .order_by("created_at", true);
        let sets: Vec<FlashcardSet> = from_records(self.backend.fetch(Collection::FlashcardSets, &query)?)?;

        let mut activities = Vec::new();
        for set in sets {
            if activities.len() == RECENT_ACTIVITY_LIMIT {
                break;
            }
            // Sets whose author has no profile row are not listed.
            let author: UserProfile = match self
                .backend
                .fetch_one(Collection::Users, &Filter::by_id(&set.user_id))
            {
                Ok(row) => from_record(row)?,
                Err(BackendError::NotFound) => continue,
                Err(e) => return Err(e),
            };

            activities.push(RecentActivity {
                id: set.id,
                title: set.title,
                description: set.description,
                total_cards: set.total_cards,
                created_at: set.created_at,
                updated_at: set.updated_at,
                last_studied_at: set.last_studied_at,
                author_name: Some(author.full_name),
            });
        }
        Ok(activities)
    }

    /// Public sets for the home page: most recently studied first, with
    /// never-studied sets ahead of studied ones, then newest first.
    pub fn load_recent_activities(&mut self) -> Vec<RecentActivity> {
        match self.fetch_recent_activities() {
            Ok(activities) => {
                self.recent_activities = activities.clone();
                activities
            }
            Err(e) => {
                error!("Error loading recent activities: {e}");
                self.recent_activities.clear();
                Vec::new()
            }
        }
    }

    /// Creates a public set and its cards, provisioning the owner's
    /// profile row first if needed.
    pub fn add_set(&mut self, draft: &NewSet, owner: &str) -> Result<FlashcardSet, StoreError> {
        self.profiles.ensure_profile(owner)?;

        let row = SetRow {
            user_id: owner,
            title: &draft.title,
            description: draft.description.as_deref(),
            folder_id: draft.folder_id.as_deref(),
            total_cards: draft.cards.len(),
            is_public: true,
        };
        let stored = self
            .backend
            .insert(Collection::FlashcardSets, to_record(&row)?)?;
        let new_set: FlashcardSet = from_record(stored)?;

        for (position, card) in draft.cards.iter().enumerate() {
            let row = CardRow {
                set_id: &new_set.id,
                term: &card.term,
                definition: &card.definition,
                position,
                is_starred: false,
            };
            self.backend.insert(Collection::Flashcards, to_record(&row)?)?;
        }
        info!("Created set '{}' with {} cards", new_set.title, draft.cards.len());

        self.load_sets(Some(owner));
        self.load_recent_activities();
        Ok(new_set)
    }

    pub fn update_set(&mut self, id: &str, update: &SetUpdate) -> Result<(), StoreError> {
        let patch = stamped(to_record(update)?, "updated_at");
        self.backend
            .update(Collection::FlashcardSets, &Filter::by_id(id), patch)?;

        let owner = self.profiles.current_identity().map(|identity| identity.id);
        self.load_sets(owner.as_deref());
        self.load_recent_activities();
        Ok(())
    }

    /// Deletes a set together with its cards.
    pub fn delete_set(&mut self, id: &str) -> Result<(), StoreError> {
        self.backend
            .delete(Collection::Flashcards, &Filter::new().eq("set_id", id))?;
        self.backend
            .delete(Collection::FlashcardSets, &Filter::by_id(id))?;

        self.sets.retain(|set| set.id != id);
        if self.current_set.as_ref().is_some_and(|set| set.id == id) {
            self.current_set = None;
        }
        Ok(())
    }

    /// Loads one set with its cards and makes it the current set.
    pub fn load_set_with_cards(&mut self, id: &str) -> Option<FlashcardSet> {
        let loaded = self
            .backend
            .fetch_one(Collection::FlashcardSets, &Filter::by_id(id))
            .and_then(from_record)
            .and_then(|set| self.hydrate(set));

        match loaded {
            Ok(set) => {
                self.current_set = Some(set.clone());
                Some(set)
            }
            Err(e) => {
                error!("Error loading flashcard set {id}: {e}");
                None
            }
        }
    }

    /// Persists a star toggle made during a quiz.
    pub fn set_card_starred(&mut self, card_id: &str, starred: bool) -> Result<(), StoreError> {
        self.backend.update(
            Collection::Flashcards,
            &Filter::by_id(card_id),
            single("is_starred", Value::Bool(starred)),
        )?;

        let current = self
            .current_set
            .as_ref()
            .filter(|set| set.flashcards.iter().any(|card: &Flashcard| card.id == card_id))
            .map(|set| set.id.clone());
        if let Some(set_id) = current {
            self.load_set_with_cards(&set_id);
        }
        Ok(())
    }

    fn fetch_folders(&self, owner: &str) -> Result<Vec<Folder>, BackendError> {
        let query = Query::new(Filter::new().eq("user_id", owner)).order_by("created_at", true);
        let mut folders: Vec<Folder> = from_records(self.backend.fetch(Collection::Folders, &query)?)?;

        for folder in &mut folders {
            let sets = Query::new(Filter::new().eq("folder_id", folder.id.as_str()));
            folder.flashcard_sets =
                from_records::<SetSummary>(self.backend.fetch(Collection::FlashcardSets, &sets)?)?;
        }
        Ok(folders)
    }

    pub fn load_folders(&mut self, owner: &str) -> Vec<Folder> {
        match self.fetch_folders(owner) {
            Ok(folders) => {
                self.folders = folders.clone();
                folders
            }
            Err(e) => {
                error!("Error loading folders: {e}");
                Vec::new()
            }
        }
    }

    pub fn create_folder(&mut self, draft: &NewFolder, owner: &str) -> Result<Folder, StoreError> {
        let row = FolderRow {
            user_id: owner,
            name: &draft.name,
            description: draft.description.as_deref(),
            icon: draft.icon.as_deref().unwrap_or(DEFAULT_FOLDER_ICON),
            color: draft.color.as_deref().unwrap_or(DEFAULT_FOLDER_COLOR),
        };
        let stored = self.backend.insert(Collection::Folders, to_record(&row)?)?;
        let folder: Folder = from_record(stored)?;
        info!("Created folder '{}'", folder.name);

        self.load_folders(owner);
        Ok(folder)
    }

    pub fn update_folder(&mut self, id: &str, update: &FolderUpdate) -> Result<(), StoreError> {
        let patch = stamped(to_record(update)?, "updated_at");
        self.backend
            .update(Collection::Folders, &Filter::by_id(id), patch)?;

        if let Some(identity) = self.profiles.current_identity() {
            self.load_folders(&identity.id);
        }
        Ok(())
    }

    /// Deletes a folder. Its sets are kept and moved out of it first.
    pub fn delete_folder(&mut self, id: &str) -> Result<(), StoreError> {
        self.backend.update(
            Collection::FlashcardSets,
            &Filter::new().eq("folder_id", id),
            single("folder_id", Value::Null),
        )?;
        self.backend.delete(Collection::Folders, &Filter::by_id(id))?;

        self.folders.retain(|folder| folder.id != id);
        Ok(())
    }

    pub fn add_set_to_folder(&mut self, set_id: &str, folder_id: &str) -> Result<(), StoreError> {
        self.backend.update(
            Collection::FlashcardSets,
            &Filter::by_id(set_id),
            single("folder_id", Value::from(folder_id)),
        )?;
        self.reload_for_current_user();
        Ok(())
    }

    pub fn remove_set_from_folder(&mut self, set_id: &str) -> Result<(), StoreError> {
        self.backend.update(
            Collection::FlashcardSets,
            &Filter::by_id(set_id),
            single("folder_id", Value::Null),
        )?;
        self.reload_for_current_user();
        Ok(())
    }

    /// Stamps `last_studied_at` on a set.
    pub(crate) fn mark_studied(&self, set_id: &str) -> Result<(), BackendError> {
        self.backend.update(
            Collection::FlashcardSets,
            &Filter::by_id(set_id),
            stamped(Record::new(), "last_studied_at"),
        )
    }

    fn reload_for_current_user(&mut self) {
        if let Some(identity) = self.profiles.current_identity() {
            self.load_sets(Some(&identity.id));
            self.load_folders(&identity.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{Identity, SqliteBackend};
    use crate::models::NewCard;
    use crate::store::{AvatarConfig, ProfileSession};

    fn store() -> (Arc<SqliteBackend>, SetStore) {
        let backend = Arc::new(SqliteBackend::open_in_memory().unwrap());
        backend.sign_in(Identity::new("u1").with_full_name("Ola Nowak"));
        let profiles = Arc::new(ProfileStore::new(
            backend.clone(),
            Arc::new(ProfileSession::new()),
            AvatarConfig::default(),
        ));
        (backend.clone(), SetStore::new(backend, profiles))
    }

    fn draft(title: &str) -> NewSet {
        NewSet {
            title: title.to_string(),
            description: Some("greetings".to_string()),
            folder_id: None,
            cards: vec![
                NewCard::new("cześć", "hello"),
                NewCard::new("dziękuję", "thank you"),
                NewCard::new("proszę", "please"),
            ],
        }
    }

    #[test]
    fn test_add_set_writes_cards_and_provisions_owner() {
        let (backend, mut store) = store();

        let set = store.add_set(&draft("Polish"), "u1").unwrap();

        assert_eq!(set.total_cards, 3);
        assert!(set.is_public);
        assert_eq!(store.sets().len(), 1);
        let terms: Vec<_> = store.sets()[0]
            .flashcards
            .iter()
            .map(|c| c.term.as_str())
            .collect();
        assert_eq!(terms, vec!["cześć", "dziękuję", "proszę"]);

        let users = backend.fetch(Collection::Users, &Query::all()).unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(store.recent_activities().len(), 1);
        assert_eq!(store.recent_activities()[0].author_name.as_deref(), Some("Ola Nowak"));
    }

    #[test]
    fn test_load_sets_newest_first_and_by_owner() {
        let (_, mut store) = store();
        store.add_set(&draft("first"), "u1").unwrap();
        store.add_set(&draft("second"), "u1").unwrap();
        store.add_set(&draft("someone else's"), "u2").unwrap();

        let mine: Vec<_> = store
            .load_sets(Some("u1"))
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(mine, vec!["second", "first"]);
        assert_eq!(store.load_sets(None).len(), 3);
    }

    #[test]
    fn test_recent_activities_order_and_author_join() {
        let (backend, mut store) = store();
        let studied = store.add_set(&draft("studied"), "u1").unwrap();
        store.add_set(&draft("fresh"), "u1").unwrap();
        store.mark_studied(&studied.id).unwrap();

        // Private sets and sets without an author profile are not listed.
        let orphan = SetRow {
            user_id: "ghost",
            title: "orphan",
            description: None,
            folder_id: None,
            total_cards: 0,
            is_public: true,
        };
        backend
            .insert(Collection::FlashcardSets, to_record(&orphan).unwrap())
            .unwrap();
        let hidden = store.add_set(&draft("hidden"), "u1").unwrap();
        store
            .update_set(
                &hidden.id,
                &SetUpdate {
                    is_public: Some(false),
                    ..SetUpdate::default()
                },
            )
            .unwrap();

        let titles: Vec<_> = store
            .load_recent_activities()
            .into_iter()
            .map(|a| a.title)
            .collect();
        assert_eq!(titles, vec!["fresh", "studied"]);
    }

    #[test]
    fn test_update_set_reloads_snapshot() {
        let (_, mut store) = store();
        let set = store.add_set(&draft("old"), "u1").unwrap();

        store
            .update_set(
                &set.id,
                &SetUpdate {
                    title: Some("new".to_string()),
                    ..SetUpdate::default()
                },
            )
            .unwrap();

        assert_eq!(store.sets()[0].title, "new");
        assert!(store.sets()[0].updated_at.is_some());
        assert_eq!(store.sets()[0].description.as_deref(), Some("greetings"));
    }

    #[test]
    fn test_delete_set_removes_cards() {
        let (backend, mut store) = store();
        let set = store.add_set(&draft("doomed"), "u1").unwrap();
        store.load_set_with_cards(&set.id);

        store.delete_set(&set.id).unwrap();

        assert!(store.sets().is_empty());
        assert!(store.current_set().is_none());
        assert!(backend.fetch(Collection::Flashcards, &Query::all()).unwrap().is_empty());
    }

    #[test]
    fn test_load_set_with_cards() {
        let (_, mut store) = store();
        let set = store.add_set(&draft("Polish"), "u1").unwrap();

        let loaded = store.load_set_with_cards(&set.id).unwrap();
        assert_eq!(loaded.flashcards.len(), 3);
        assert_eq!(loaded.flashcards[2].position, 2);
        assert_eq!(store.current_set().map(|s| s.id.as_str()), Some(set.id.as_str()));

        assert!(store.load_set_with_cards("missing").is_none());
    }

    #[test]
    fn test_set_card_starred_persists() {
        let (_, mut store) = store();
        let set = store.add_set(&draft("Polish"), "u1").unwrap();
        let card_id = store.load_set_with_cards(&set.id).unwrap().flashcards[1].id.clone();

        store.set_card_starred(&card_id, true).unwrap();

        let current = store.current_set().unwrap();
        assert!(current.flashcards[1].is_starred);
        assert!(!current.flashcards[0].is_starred);
    }

    #[test]
    fn test_folder_lifecycle() {
        let (_, mut store) = store();
        let set = store.add_set(&draft("Polish"), "u1").unwrap();

        let folder = store.create_folder(&NewFolder::named("Languages"), "u1").unwrap();
        assert_eq!(folder.icon.as_deref(), Some(DEFAULT_FOLDER_ICON));
        assert_eq!(folder.color.as_deref(), Some(DEFAULT_FOLDER_COLOR));
        assert_eq!(store.folders().len(), 1);

        store.add_set_to_folder(&set.id, &folder.id).unwrap();
        assert_eq!(store.folders()[0].flashcard_sets.len(), 1);
        assert_eq!(store.folders()[0].flashcard_sets[0].title, "Polish");
        assert_eq!(
            store.sets()[0].folder.as_ref().map(|f| f.name.as_str()),
            Some("Languages")
        );

        store.remove_set_from_folder(&set.id).unwrap();
        assert!(store.folders()[0].flashcard_sets.is_empty());
        assert!(store.sets()[0].folder_id.is_none());

        store
            .update_folder(
                &folder.id,
                &FolderUpdate {
                    name: Some("Words".to_string()),
                    ..FolderUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(store.folders()[0].name, "Words");
    }

    #[test]
    fn test_delete_folder_keeps_its_sets() {
        let (_, mut store) = store();
        let set = store.add_set(&draft("Polish"), "u1").unwrap();
        let folder = store.create_folder(&NewFolder::named("Languages"), "u1").unwrap();
        store.add_set_to_folder(&set.id, &folder.id).unwrap();

        store.delete_folder(&folder.id).unwrap();

        assert!(store.folders().is_empty());
        let sets = store.load_sets(Some("u1"));
        assert_eq!(sets.len(), 1);
        assert!(sets[0].folder_id.is_none());
        assert!(sets[0].folder.is_none());
    }
}
