// Mapping from Firestore DTOs to domain models

use super::models::BookRecord;
use crate::firestore_client::Document;

/// Read a string field; absent or non-string values become "".
fn string_field(doc: &Document, key: &str) -> String {
    doc.fields
        .get(key)
        .and_then(|v| v.string_value.clone())
        .unwrap_or_default()
}

pub fn map_document_to_book(doc: &Document) -> BookRecord {
    BookRecord {
        name: string_field(doc, "name"),
        author: string_field(doc, "author"),
        image: string_field(doc, "image"),
        description: string_field(doc, "description"),
        link: string_field(doc, "link"),
        category: string_field(doc, "category"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_description_maps_to_empty() {
        let json = r#"{
            "name": "projects/p/databases/(default)/documents/books/affiliate_books/Juniors/1",
            "fields": {
                "name": { "stringValue": "Life Skills for Teens: How to Cook" },
                "author": { "stringValue": "who knows" },
                "image": { "stringValue": "R.drawable.book_cover" },
                "link": { "stringValue": "https://amzn.to/3DYpg0K" },
                "category": { "stringValue": "Juniors" }
            }
        }"#;
        let doc: Document = serde_json::from_str(json).unwrap();
        let book = map_document_to_book(&doc);
        assert_eq!(book.description, "");
        assert_eq!(book.name, "Life Skills for Teens: How to Cook");
        assert_eq!(book.image, "R.drawable.book_cover");
        assert_eq!(book.category, "Juniors");
    }

    #[test]
    fn non_string_and_missing_fields_are_tolerated() {
        let json = r#"{ "fields": { "author": { "nullValue": null }, "name": { "integerValue": "7" } } }"#;
        let doc: Document = serde_json::from_str(json).unwrap();
        assert_eq!(map_document_to_book(&doc), BookRecord::default());

        let bare: Document = serde_json::from_str(r#"{ "name": "x" }"#).unwrap();
        assert_eq!(map_document_to_book(&bare), BookRecord::default());
    }
}
