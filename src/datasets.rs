//! Loading interaction data from CSV files.
//!
//! Raw user and item identifiers can be arbitrary strings (song titles,
//! MovieLens ids, ...); they are mapped to dense indices in order of first
//! appearance.
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use csv;
use failure;

use data::{Interaction, Interactions};

/// Dataset error types.
#[derive(Debug, Fail)]
pub enum DatasetError {
    /// A configured column is not in the header.
    #[fail(display = "Column not found in header: {}.", name)]
    MissingColumn {
        /// Column name.
        name: String,
    },
    /// The rating column holds something other than a number.
    #[fail(display = "Invalid rating {:?} on line {}.", value, line)]
    InvalidRating {
        /// Raw value.
        value: String,
        /// Line in the file, counting the header.
        line: u64,
    },
}

/// Names of the columns to read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Columns {
    /// User identifier column.
    pub user: String,
    /// Item identifier column.
    pub item: String,
    /// Optional rating or play count column.
    pub rating: Option<String>,
}

impl Columns {
    /// Implicit feedback from the given user and item columns.
    pub fn new(user: &str, item: &str) -> Self {
        Columns {
            user: user.to_owned(),
            item: item.to_owned(),
            rating: None,
        }
    }

    /// Also read ratings from `rating`.
    pub fn rating(mut self, rating: &str) -> Self {
        self.rating = Some(rating.to_owned());
        self
    }

    /// Layout of the MovieLens `ratings.csv` file.
    pub fn movielens() -> Self {
        Columns::new("userId", "movieId").rating("rating")
    }
}

/// Bidirectional mapping between raw identifiers and dense indices.
#[derive(Clone, Debug, Default)]
pub struct IdIndex {
    ids: Vec<String>,
    lookup: HashMap<String, usize>,
}

impl IdIndex {
    /// Index of `raw`, allocating the next one if unseen.
    pub fn get_or_insert(&mut self, raw: &str) -> usize {
        if let Some(&idx) = self.lookup.get(raw) {
            return idx;
        }

        let idx = self.ids.len();
        self.ids.push(raw.to_owned());
        self.lookup.insert(raw.to_owned(), idx);

        idx
    }

    /// Index of `raw`, if seen.
    pub fn index(&self, raw: &str) -> Option<usize> {
        self.lookup.get(raw).cloned()
    }

    /// Raw identifier of `idx`.
    pub fn raw(&self, idx: usize) -> Option<&str> {
        self.ids.get(idx).map(|id| id.as_str())
    }

    /// Number of distinct identifiers.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether no identifiers were seen.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Interactions together with the identifier mappings used to build them.
#[derive(Clone, Debug)]
pub struct Dataset {
    /// The interactions, in file order.
    pub interactions: Interactions,
    /// Raw user identifiers.
    pub users: IdIndex,
    /// Raw item identifiers.
    pub items: IdIndex,
}

/// Read a headered CSV file.
pub fn load_csv<P: AsRef<Path>>(path: P, columns: &Columns) -> Result<Dataset, failure::Error> {
    let dataset = read_csv(csv::Reader::from_path(path)?, columns)?;

    info!(
        interactions = dataset.interactions.len(),
        users = dataset.users.len(),
        items = dataset.items.len(),
        "loaded dataset"
    );

    Ok(dataset)
}

/// Read headered CSV data from any reader.
pub fn read_csv<R: Read>(mut reader: csv::Reader<R>, columns: &Columns) -> Result<Dataset, failure::Error> {
    let headers = reader.headers()?.clone();
    let position = |name: &str| {
        headers
            .iter()
            .position(|header| header.trim() == name)
            .ok_or_else(|| DatasetError::MissingColumn {
                name: name.to_owned(),
            })
    };

    let user_column = position(columns.user.as_str())?;
    let item_column = position(columns.item.as_str())?;
    let rating_column = match columns.rating {
        Some(ref name) => Some(position(name.as_str())?),
        None => None,
    };

    let mut users = IdIndex::default();
    let mut items = IdIndex::default();
    let mut interactions = Interactions::new(0, 0);

    for record in reader.records() {
        let record = record?;

        let user_id = users.get_or_insert(record[user_column].trim());
        let item_id = items.get_or_insert(record[item_column].trim());
        let rating = match rating_column {
            Some(column) => {
                let value = record[column].trim();
                let rating = value.parse::<f32>().map_err(|_| DatasetError::InvalidRating {
                    value: value.to_owned(),
                    line: record.position().map_or(0, |position| position.line()),
                })?;
                Some(rating)
            }
            None => None,
        };

        interactions.push(Interaction::new(user_id, item_id, rating));
    }

    Ok(Dataset {
        interactions,
        users,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(data: &str, columns: &Columns) -> Result<Dataset, failure::Error> {
        read_csv(csv::Reader::from_reader(data.as_bytes()), columns)
    }

    #[test]
    fn string_identifiers() {
        let data = "user_id,song,listen_count\n\
                    a,Naked - Marques Houston,1\n\
                    b,Nice & Slow - Usher,3\n\
                    a,Nice & Slow - Usher,2\n";
        let dataset = read(data, &Columns::new("user_id", "song")).unwrap();

        assert_eq!(dataset.interactions.shape(), (2, 2));
        assert_eq!(dataset.users.index("b"), Some(1));
        assert_eq!(dataset.items.raw(1), Some("Nice & Slow - Usher"));
        assert!(dataset.interactions.data().iter().all(|x| x.rating().is_none()));
    }

    #[test]
    fn ratings() {
        let data = "userId,movieId,rating,timestamp\n\
                    1,318,4.5,100\n\
                    1,296,3.0,101\n\
                    7,318,5.0,102\n";
        let dataset = read(data, &Columns::movielens()).unwrap();

        let ratings: Vec<_> = dataset.interactions.data().iter().map(|x| x.rating()).collect();
        assert_eq!(ratings, vec![Some(4.5), Some(3.0), Some(5.0)]);
        assert_eq!(dataset.items.index("318"), Some(0));
        assert_eq!(dataset.interactions.data()[2].user_id(), 1);
    }

    #[test]
    fn missing_column() {
        let error = read("user,item\n1,2\n", &Columns::movielens()).unwrap_err();

        match error.downcast::<DatasetError>() {
            Ok(DatasetError::MissingColumn { name }) => assert_eq!(name, "userId"),
            other => panic!("Expected missing column, got {:?}", other),
        }
    }

    #[test]
    fn invalid_rating() {
        let error = read("userId,movieId,rating\n1,2,good\n", &Columns::movielens()).unwrap_err();

        match error.downcast::<DatasetError>() {
            Ok(DatasetError::InvalidRating { value, line }) => {
                assert_eq!(value, "good");
                assert_eq!(line, 2);
            }
            other => panic!("Expected invalid rating, got {:?}", other),
        }
    }

    #[test]
    fn ragged_rows_are_errors() {
        assert!(read("userId,movieId,rating\n1,2\n", &Columns::movielens()).is_err());
    }
}
