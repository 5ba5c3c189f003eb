//! WordPress export (WXR) reader
//!
//! Pulls the fields reelpress needs out of `rss/channel/item` elements. Only
//! items of post type `post` are returned; attachments, pages and menu items
//! are skipped.

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Post meta key holding the TMDB movie id
pub const TMDB_ID_META_KEY: &str = "tmdb_id";

/// Post meta key holding the IMDb id
pub const IMDB_ID_META_KEY: &str = "imdb_id";

/// Errors that can occur while reading an export
#[derive(Debug, Error)]
pub enum ExportError {
    /// The document is not well-formed XML
    #[error("XML parse error: {0}")]
    Xml(String),
}

/// A taxonomy term attached to a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    /// Taxonomy, e.g. "category" or "post_tag"
    pub domain: String,
    /// Display name of the term
    pub name: String,
}

/// A post as exported by WordPress
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub title: String,
    /// Publish date, `wp:post_date` when present, else `pubDate`
    pub date: Option<String>,
    /// HTML body
    pub content: String,
    pub terms: Vec<Term>,
    /// TMDB movie id from post meta
    pub tmdb_id: Option<String>,
    /// IMDb id from post meta
    pub imdb_id: Option<String>,
}

impl Post {
    /// The TMDB id if present and non-blank
    pub fn movie_id(&self) -> Option<&str> {
        self.tmdb_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Parse the posts out of a WXR document
pub fn parse_export(xml: &[u8]) -> Result<Vec<Post>, ExportError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut posts = Vec::new();
    let mut buf = Vec::new();

    let mut current_item: Option<PostBuilder> = None;
    let mut current_meta: Option<(Option<String>, Option<String>)> = None;
    let mut term_domain = String::new();
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                text.clear();
                match e.name().as_ref() {
                    b"item" => current_item = Some(PostBuilder::default()),
                    b"wp:postmeta" => current_meta = Some((None, None)),
                    b"category" => {
                        term_domain = match e.try_get_attribute("domain") {
                            Ok(Some(attr)) => attr
                                .unescape_value()
                                .map(|v| v.into_owned())
                                .unwrap_or_default(),
                            _ => String::new(),
                        };
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                let chunk = e
                    .unescape()
                    .map_err(|err| ExportError::Xml(format!("bad text content: {}", err)))?;
                text.push_str(&chunk);
            }
            Ok(Event::CData(e)) => {
                text.push_str(&String::from_utf8_lossy(&e));
            }
            Ok(Event::End(e)) => {
                let value = std::mem::take(&mut text);
                let Some(item) = current_item.as_mut() else {
                    buf.clear();
                    continue;
                };

                match e.name().as_ref() {
                    b"item" => {
                        if let Some(builder) = current_item.take() {
                            if let Some(post) = builder.build() {
                                posts.push(post);
                            }
                        }
                    }
                    b"title" => item.title = value,
                    b"pubDate" => item.pub_date = Some(value),
                    b"wp:post_date" => item.post_date = Some(value),
                    b"content:encoded" => item.content = value,
                    b"wp:post_type" => item.post_type = Some(value),
                    b"category" => item.terms.push(Term {
                        domain: std::mem::take(&mut term_domain),
                        name: value,
                    }),
                    b"wp:meta_key" => {
                        if let Some(meta) = current_meta.as_mut() {
                            meta.0 = Some(value);
                        }
                    }
                    b"wp:meta_value" => {
                        if let Some(meta) = current_meta.as_mut() {
                            meta.1 = Some(value);
                        }
                    }
                    b"wp:postmeta" => {
                        if let Some((Some(key), meta_value)) = current_meta.take() {
                            item.meta.push((key, meta_value.unwrap_or_default()));
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExportError::Xml(format!("{}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(posts)
}

#[derive(Default)]
struct PostBuilder {
    title: String,
    pub_date: Option<String>,
    post_date: Option<String>,
    content: String,
    post_type: Option<String>,
    terms: Vec<Term>,
    meta: Vec<(String, String)>,
}

impl PostBuilder {
    fn meta_value(&self, key: &str) -> Option<String> {
        self.meta
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    fn build(self) -> Option<Post> {
        if self.post_type.as_deref().is_some_and(|t| t != "post") {
            return None;
        }

        let tmdb_id = self.meta_value(TMDB_ID_META_KEY);
        let imdb_id = self.meta_value(IMDB_ID_META_KEY);
        Some(Post {
            title: self.title,
            date: self.post_date.or(self.pub_date),
            content: self.content,
            terms: self.terms,
            tmdb_id,
            imdb_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"
    xmlns:content="http://purl.org/rss/1.0/modules/content/"
    xmlns:wp="http://wordpress.org/export/1.2/">
<channel>
    <title>Movie Nights</title>
    <item>
        <title>Matrix night at the Rio</title>
        <pubDate>Sat, 02 Mar 2019 20:00:00 +0000</pubDate>
        <content:encoded><![CDATA[<p>Red pill &amp; blue pill.</p>]]></content:encoded>
        <wp:post_date><![CDATA[2019-03-02 20:00:00]]></wp:post_date>
        <wp:post_type><![CDATA[post]]></wp:post_type>
        <category domain="category" nicename="rio"><![CDATA[Rio Theatre]]></category>
        <category domain="post_tag" nicename="weekly"><![CDATA[Weekly]]></category>
        <wp:postmeta>
            <wp:meta_key><![CDATA[tmdb_id]]></wp:meta_key>
            <wp:meta_value><![CDATA[603]]></wp:meta_value>
        </wp:postmeta>
        <wp:postmeta>
            <wp:meta_key><![CDATA[imdb_id]]></wp:meta_key>
            <wp:meta_value><![CDATA[tt0133093]]></wp:meta_value>
        </wp:postmeta>
    </item>
    <item>
        <title>Poster scan</title>
        <wp:post_type><![CDATA[attachment]]></wp:post_type>
    </item>
    <item>
        <title>Mystery screening</title>
        <pubDate>Fri, 01 Nov 2019 20:00:00 +0000</pubDate>
        <content:encoded><![CDATA[Surprise!]]></content:encoded>
        <wp:postmeta>
            <wp:meta_key><![CDATA[imdb_id]]></wp:meta_key>
            <wp:meta_value><![CDATA[tt0000001]]></wp:meta_value>
        </wp:postmeta>
    </item>
</channel>
</rss>"#;

    #[test]
    fn test_parse_export_reads_posts_and_skips_attachments() {
        let posts = parse_export(EXPORT.as_bytes()).unwrap();

        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].title, "Matrix night at the Rio");
        assert_eq!(posts[1].title, "Mystery screening");
    }

    #[test]
    fn test_parse_export_reads_meta_identifiers() {
        let posts = parse_export(EXPORT.as_bytes()).unwrap();

        assert_eq!(posts[0].tmdb_id.as_deref(), Some("603"));
        assert_eq!(posts[0].imdb_id.as_deref(), Some("tt0133093"));
        assert_eq!(posts[1].movie_id(), None);
        assert_eq!(posts[1].imdb_id.as_deref(), Some("tt0000001"));
    }

    #[test]
    fn test_parse_export_prefers_post_date() {
        let posts = parse_export(EXPORT.as_bytes()).unwrap();

        assert_eq!(posts[0].date.as_deref(), Some("2019-03-02 20:00:00"));
        assert_eq!(posts[1].date.as_deref(), Some("Fri, 01 Nov 2019 20:00:00 +0000"));
    }

    #[test]
    fn test_parse_export_keeps_cdata_content_verbatim() {
        let posts = parse_export(EXPORT.as_bytes()).unwrap();

        assert_eq!(posts[0].content, "<p>Red pill &amp; blue pill.</p>");
    }

    #[test]
    fn test_parse_export_reads_terms_with_domains() {
        let posts = parse_export(EXPORT.as_bytes()).unwrap();

        assert_eq!(
            posts[0].terms,
            vec![
                Term {
                    domain: "category".to_string(),
                    name: "Rio Theatre".to_string()
                },
                Term {
                    domain: "post_tag".to_string(),
                    name: "Weekly".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_movie_id_ignores_blank_values() {
        let post = Post {
            tmdb_id: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(post.movie_id(), None);

        let post = Post {
            tmdb_id: Some(" 603 ".to_string()),
            ..Default::default()
        };
        assert_eq!(post.movie_id(), Some("603"));
    }

    #[test]
    fn test_parse_export_rejects_malformed_xml() {
        let result = parse_export(b"<rss><channel><item><title>x</item></channel></rss>");
        assert!(result.is_err());
    }
}
