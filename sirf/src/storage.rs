use crate::error::StorageError;

/// Named byte files the almanac is saved to.
pub trait Storage {
    fn exists(&mut self, name: &str) -> bool;

    /// Creates an empty file, failing if one already exists.
    fn create(&mut self, name: &str) -> Result<(), StorageError>;

    fn delete(&mut self, name: &str) -> Result<(), StorageError>;

    fn append(&mut self, name: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Fills `buf` with the bytes at `offset`.
    ///
    /// Fails with [`StorageError::Seek`] when the file holds fewer bytes.
    fn read_at(&mut self, name: &str, offset: u64, buf: &mut [u8]) -> Result<(), StorageError>;

    fn size(&mut self, name: &str) -> Result<u64, StorageError>;
}

impl<S: Storage + ?Sized> Storage for &mut S {
    fn exists(&mut self, name: &str) -> bool {
        (**self).exists(name)
    }

    fn create(&mut self, name: &str) -> Result<(), StorageError> {
        (**self).create(name)
    }

    fn delete(&mut self, name: &str) -> Result<(), StorageError> {
        (**self).delete(name)
    }

    fn append(&mut self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        (**self).append(name, bytes)
    }

    fn read_at(&mut self, name: &str, offset: u64, buf: &mut [u8]) -> Result<(), StorageError> {
        (**self).read_at(name, offset, buf)
    }

    fn size(&mut self, name: &str) -> Result<u64, StorageError> {
        (**self).size(name)
    }
}

#[cfg(feature = "alloc")]
mod mem {
    use alloc::{collections::BTreeMap, string::String, vec::Vec};

    use super::Storage;
    use crate::error::StorageError;

    /// Files held in memory
    #[derive(Debug, Default, Clone)]
    pub struct MemStorage {
        files: BTreeMap<String, Vec<u8>>,
    }

    impl MemStorage {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn contents(&self, name: &str) -> Option<&[u8]> {
            self.files.get(name).map(Vec::as_slice)
        }

        /// Stores `bytes` as `name`, replacing any previous file.
        pub fn insert(&mut self, name: &str, bytes: Vec<u8>) {
            self.files.insert(String::from(name), bytes);
        }
    }

    impl Storage for MemStorage {
        fn exists(&mut self, name: &str) -> bool {
            self.files.contains_key(name)
        }

        fn create(&mut self, name: &str) -> Result<(), StorageError> {
            if self.files.contains_key(name) {
                return Err(StorageError::Create);
            }
            self.files.insert(String::from(name), Vec::new());
            Ok(())
        }

        fn delete(&mut self, name: &str) -> Result<(), StorageError> {
            self.files
                .remove(name)
                .map(|_| ())
                .ok_or(StorageError::Delete)
        }

        fn append(&mut self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
            let file = self.files.get_mut(name).ok_or(StorageError::Write)?;
            file.extend_from_slice(bytes);
            Ok(())
        }

        fn read_at(&mut self, name: &str, offset: u64, buf: &mut [u8]) -> Result<(), StorageError> {
            let file = self.files.get(name).ok_or(StorageError::FileOpen)?;
            let start = usize::try_from(offset).map_err(|_| StorageError::Seek)?;
            let src = file
                .get(start..start.saturating_add(buf.len()))
                .ok_or(StorageError::Seek)?;
            buf.copy_from_slice(src);
            Ok(())
        }

        fn size(&mut self, name: &str) -> Result<u64, StorageError> {
            let file = self.files.get(name).ok_or(StorageError::FileOpen)?;
            Ok(file.len() as u64)
        }
    }
}

#[cfg(feature = "alloc")]
pub use mem::MemStorage;

#[cfg(feature = "std")]
mod file {
    use std::{
        fs::{self, File, OpenOptions},
        io::{Read, Seek, SeekFrom, Write},
        path::PathBuf,
    };

    use super::Storage;
    use crate::error::StorageError;

    /// Files in one directory of the host filesystem
    #[derive(Debug, Clone)]
    pub struct FileStorage {
        root: PathBuf,
    }

    impl FileStorage {
        pub fn new(root: impl Into<PathBuf>) -> Self {
            Self { root: root.into() }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.root.join(name)
        }
    }

    impl Storage for FileStorage {
        fn exists(&mut self, name: &str) -> bool {
            self.path(name).is_file()
        }

        fn create(&mut self, name: &str) -> Result<(), StorageError> {
            OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.path(name))
                .map(|_| ())
                .map_err(|_| StorageError::Create)
        }

        fn delete(&mut self, name: &str) -> Result<(), StorageError> {
            fs::remove_file(self.path(name)).map_err(|_| StorageError::Delete)
        }

        fn append(&mut self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
            let mut file = OpenOptions::new()
                .append(true)
                .open(self.path(name))
                .map_err(|_| StorageError::FileOpen)?;
            file.write_all(bytes).map_err(|_| StorageError::Write)
        }

        fn read_at(&mut self, name: &str, offset: u64, buf: &mut [u8]) -> Result<(), StorageError> {
            let mut file = File::open(self.path(name)).map_err(|_| StorageError::FileOpen)?;
            file.seek(SeekFrom::Start(offset))
                .map_err(|_| StorageError::Seek)?;
            file.read_exact(buf).map_err(|_| StorageError::Seek)
        }

        fn size(&mut self, name: &str) -> Result<u64, StorageError> {
            fs::metadata(self.path(name))
                .map(|m| m.len())
                .map_err(|_| StorageError::FileOpen)
        }
    }
}

#[cfg(feature = "std")]
pub use file::FileStorage;
