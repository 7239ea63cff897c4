//! On-disk artifact helpers: bincode for bulk data, JSON for metadata.
//! Every write goes to a uniquely named sibling temp file and is renamed
//! into place, so concurrent writers never share a temp path.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::error::{Result, SearchError};

/// Write `bytes` to `path` via temp file + rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| SearchError::Io(e.error))?;
    Ok(())
}

pub fn save_bincode<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = bincode::serialize(value)?;
    write_atomic(path, &bytes)
}

/// Read a bincode artifact. A missing file is `IndexNotFound`.
pub fn load_bincode<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = read_required(path)?;
    Ok(bincode::deserialize(&bytes)?)
}

pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let data = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &data)
}

/// Read a JSON artifact. A missing file is `IndexNotFound`.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = read_required(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn read_required(path: &Path) -> Result<Vec<u8>> {
    if !path.is_file() {
        return Err(SearchError::IndexNotFound(path.to_path_buf()));
    }
    Ok(std::fs::read(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_bincode_round_trip_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("map.bin");
        let mut map: HashMap<String, u32> = HashMap::new();
        map.insert("bear".to_string(), 2);

        save_bincode(&path, &map).unwrap();
        let back: HashMap<String, u32> = load_bincode(&path).unwrap();
        assert_eq!(back, map);
        let leftovers = std::fs::read_dir(dir.path().join("nested")).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_concurrent_writers_to_same_path_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.json");

        let writers: Vec<_> = (0..8u32)
            .map(|i| {
                let path = path.clone();
                std::thread::spawn(move || save_json(&path, &vec![i; 1000]))
            })
            .collect();
        for w in writers {
            w.join().unwrap().unwrap();
        }

        let back: Vec<u32> = load_json(&path).unwrap();
        assert_eq!(back.len(), 1000);
        assert!(back.iter().all(|v| *v == back[0]));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_artifact_is_index_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_json::<Vec<u32>>(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, SearchError::IndexNotFound(_)));
    }
}
