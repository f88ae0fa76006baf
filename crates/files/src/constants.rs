/// Folder inside each owner's storage root that holds content-addressed documents.
pub const FILES_FOLDER_NAME: &str = "files";

/// Hash algorithm used for content addressing; also the name of the sub-folder.
pub const HASH_ALGORITHM: &str = "sha256";
