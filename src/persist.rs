use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::value::Value;

/// A value persisted to `path` as JSON. Loads the stored datum on
/// construction, falling back to `default` when the file is missing or
/// unreadable, and rewrites the file on every change, best effort. The
/// stored form is `Option<T>`, so a persisted "no value" round-trips.
pub fn file_backed_value<T, P>(path: P, default: T) -> Value<T>
where
	T: Serialize + DeserializeOwned + 'static,
	P: AsRef<Path>,
{
	let path: PathBuf = path.as_ref().to_path_buf();
	let datum = match fs::read(&path) {
		Ok(bytes) => match serde_json::from_slice::<Option<T>>(&bytes) {
			Ok(stored) => stored,
			Err(err) => {
				tracing::warn!(
					path = %path.display(),
					%err,
					"unreadable backing file, using default"
				);
				Some(default)
			}
		},
		Err(_) => Some(default),
	};

	let value = match datum {
		Some(datum) => Value::new(datum),
		None => Value::unset(),
	};
	value.on_change(move |datum: Option<&T>| {
		let json = match serde_json::to_vec(&datum) {
			Ok(json) => json,
			Err(err) => {
				tracing::warn!(path = %path.display(), %err, "failed to serialize datum");
				return;
			}
		};
		if let Err(err) = fs::write(&path, json) {
			tracing::warn!(path = %path.display(), %err, "failed to persist datum");
		}
	});
	value
}
