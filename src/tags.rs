use crate::client::{add_options, Client, ListOptions, Response};
use crate::error::Error;
use crate::links::{Links, Meta};
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

const TAGS_BASE_PATH: &str = "v2/tags";

/// Kind of resource a tag can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Droplet,
    Image,
}

/// Something a tag points at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "resource_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "resource_type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ResourceType>,
}

/// A named label and the resources currently carrying it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Resource>,
}

#[derive(Debug, Deserialize)]
struct TagsRoot {
    #[serde(default)]
    tags: Vec<Tag>,
    #[serde(default)]
    links: Option<Links>,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct TagRoot {
    tag: Tag,
}

#[derive(Debug, Serialize)]
struct TagCreateRequest<'a> {
    name: &'a str,
}

/// Operations on the tags endpoints.
///
/// A trait so higher layers can substitute a fake implementation when
/// testing code built on top of tags.
#[async_trait]
pub trait TagsService {
    /// List all tags, one page at a time.
    async fn list(&self, opts: Option<&ListOptions>) -> Result<(Vec<Tag>, Response), Error>;
    /// Fetch a single tag by name.
    async fn get(&self, name: &str) -> Result<(Tag, Response), Error>;
    /// Create a new tag.
    async fn create(&self, name: &str) -> Result<(Tag, Response), Error>;
    /// Delete an existing tag.
    async fn delete(&self, name: &str) -> Result<Response, Error>;
}

/// Tags endpoints of the API, borrowed from a [`Client`].
#[derive(Debug, Clone, Copy)]
pub struct Tags<'a> {
    client: &'a Client,
}

impl<'a> Tags<'a> {
    pub(crate) fn new(client: &'a Client) -> Tags<'a> {
        Tags { client }
    }
}

// Tag names land in the URL path, so percent-encode whatever the caller
// hands us.
fn tag_path(name: &str) -> String {
    format!("{}/{}", TAGS_BASE_PATH, urlencoding::encode(name))
}

#[async_trait]
impl TagsService for Tags<'_> {
    async fn list(&self, opts: Option<&ListOptions>) -> Result<(Vec<Tag>, Response), Error> {
        let path = match opts {
            Some(opts) => add_options(TAGS_BASE_PATH, opts)?,
            None => TAGS_BASE_PATH.to_string(),
        };
        let req = self.client.new_request::<()>(Method::GET, &path, None)?;
        let (root, mut response): (TagsRoot, Response) = self.client.execute(req).await?;
        if root.links.is_some() {
            response.links = root.links;
        }
        if root.meta.is_some() {
            response.meta = root.meta;
        }
        Ok((root.tags, response))
    }

    async fn get(&self, name: &str) -> Result<(Tag, Response), Error> {
        let req = self
            .client
            .new_request::<()>(Method::GET, &tag_path(name), None)?;
        let (root, response): (TagRoot, Response) = self.client.execute(req).await?;
        Ok((root.tag, response))
    }

    async fn create(&self, name: &str) -> Result<(Tag, Response), Error> {
        let body = TagCreateRequest { name };
        let req = self
            .client
            .new_request(Method::POST, TAGS_BASE_PATH, Some(&body))?;
        let (root, response): (TagRoot, Response) = self.client.execute(req).await?;
        Ok((root.tag, response))
    }

    async fn delete(&self, name: &str) -> Result<Response, Error> {
        let req = self
            .client
            .new_request::<()>(Method::DELETE, &tag_path(name), None)?;
        self.client.execute_unit(req).await
    }
}
