//! Item images and the streams watching them.
//!
//! Each item keeps its current field image in insertion order: fields
//! added by later posts go to the end, while updated fields keep their
//! original position. This is the order refreshes are sent in.

use indexmap::IndexMap;

use omm_core::{Data, DataType, FieldList};

use crate::types::ClientId;

// Fields every seeded item starts out with (ids from RDMFieldDictionary).
const DSPLY_NAME: i16 = 3;
const TRDPRC_1: i16 = 6;
const BID: i16 = 22;
const ASK: i16 = 25;
const BIDSIZE: i16 = 30;
const ASKSIZE: i16 = 31;

/// One open item stream on one client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    pub client_id: ClientId,
    pub stream_id: i32,
}

#[derive(Debug, Default)]
struct ItemImage {
    fields: IndexMap<i16, Data>,
    subscribers: Vec<Subscription>,
}

impl ItemImage {
    fn to_field_list(&self) -> FieldList {
        let mut list = FieldList::new();
        for (fid, value) in &self.fields {
            list.push(*fid, value.clone());
        }
        list
    }
}

/// All items the provider knows about.
#[derive(Debug, Default)]
pub struct ItemStore {
    items: IndexMap<String, ItemImage>,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `name` with a display name and blank quote fields.
    /// An existing item is left alone.
    pub fn seed(&mut self, name: &str) {
        if self.items.contains_key(name) {
            return;
        }
        let mut image = ItemImage::default();
        image
            .fields
            .insert(DSPLY_NAME, Data::Rmtes(name.as_bytes().to_vec().into()));
        for fid in [TRDPRC_1, BID, ASK, BIDSIZE, ASKSIZE] {
            image.fields.insert(fid, Data::Blank(DataType::Real));
        }
        self.items.insert(name.to_string(), image);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Current image of `name` as a FieldList.
    pub fn image(&self, name: &str) -> Option<FieldList> {
        self.items.get(name).map(ItemImage::to_field_list)
    }

    /// Merge `fields` into the image of `name`, creating the item if
    /// needed. Returns true when the item was created by this call.
    pub fn apply(&mut self, name: &str, fields: &FieldList) -> bool {
        let created = !self.items.contains_key(name);
        let image = self.items.entry(name.to_string()).or_default();
        for entry in &fields.entries {
            image.fields.insert(entry.field_id, entry.load.clone());
        }
        created
    }

    /// Register `sub` on `name`. Re-requesting on an open stream does not
    /// register it twice.
    pub fn subscribe(&mut self, name: &str, sub: Subscription) -> bool {
        match self.items.get_mut(name) {
            Some(image) => {
                if !image.subscribers.contains(&sub) {
                    image.subscribers.push(sub);
                }
                true
            }
            None => false,
        }
    }

    /// Drop the subscription on this stream. Returns the item it was on.
    pub fn unsubscribe(&mut self, client_id: ClientId, stream_id: i32) -> Option<String> {
        let sub = Subscription {
            client_id,
            stream_id,
        };
        for (name, image) in self.items.iter_mut() {
            if let Some(pos) = image.subscribers.iter().position(|s| *s == sub) {
                image.subscribers.remove(pos);
                return Some(name.clone());
            }
        }
        None
    }

    /// Item open on this client's stream, if any.
    pub fn item_for_stream(&self, client_id: ClientId, stream_id: i32) -> Option<&str> {
        let sub = Subscription {
            client_id,
            stream_id,
        };
        self.items
            .iter()
            .find(|(_, image)| image.subscribers.contains(&sub))
            .map(|(name, _)| name.as_str())
    }

    pub fn subscribers(&self, name: &str) -> Vec<Subscription> {
        self.items
            .get(name)
            .map(|image| image.subscribers.clone())
            .unwrap_or_default()
    }

    /// Drop every subscription whose client fails `keep`. Returns how many
    /// were removed.
    pub fn retain_clients(&mut self, mut keep: impl FnMut(ClientId) -> bool) -> usize {
        let mut removed = 0;
        for image in self.items.values_mut() {
            let before = image.subscribers.len();
            image.subscribers.retain(|s| keep(s.client_id));
            removed += before - image.subscribers.len();
        }
        removed
    }
}
