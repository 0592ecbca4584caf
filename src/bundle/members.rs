//! Archive member list
//!
//! The description always comes first, then the optional signature, then
//! every artifact in discovery order. A path referenced more than once is
//! kept only at its first position.

use serde::Serialize;
use swu_libconfig::Value;

use crate::artifact::ArtifactClass;
use crate::signing::{DESCRIPTION_FILE, SIGNATURE_FILE};
use crate::walker::find_by_key;

/// Ordered, duplicate-free list of archive member paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MemberList {
    members: Vec<String>,
}

impl MemberList {
    /// Start a list with the description as its first member.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            members: vec![description.into()],
        }
    }

    /// Build the member list for an annotated `software` tree.
    pub fn for_software(software: &Value, signed: bool) -> Self {
        let mut members = Self::new(DESCRIPTION_FILE);
        if signed {
            members.push(SIGNATURE_FILE);
        }
        for class in ArtifactClass::ORDER {
            for entry in find_by_key(class.key(), software) {
                if let Some(filename) = entry
                    .as_group()
                    .and_then(|g| g.get("filename"))
                    .and_then(Value::as_str)
                {
                    members.push(filename);
                }
            }
        }
        members
    }

    /// Append a member unless already present. Returns whether it was added.
    pub fn push(&mut self, member: impl Into<String>) -> bool {
        let member = member.into();
        if self.members.contains(&member) {
            return false;
        }
        self.members.push(member);
        true
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.members
    }

    pub fn into_vec(self) -> Vec<String> {
        self.members
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn software(text: &str) -> Value {
        swu_libconfig::parse(text)
            .unwrap()
            .get("software")
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_push_deduplicates_keeping_first() {
        let mut members = MemberList::new("sw-description");
        assert!(members.push("a.img"));
        assert!(members.push("b.sh"));
        assert!(!members.push("a.img"));
        assert!(!members.push("sw-description"));

        assert_eq!(members.as_slice(), &["sw-description", "a.img", "b.sh"]);
    }

    #[test]
    fn test_class_order_and_signature_position() {
        let tree = software(
            r#"software = {
                files = ( { filename = "extra.tar"; } );
                scripts = ( { filename = "post.sh"; } );
                images = ( { filename = "rootfs.img"; }, { type = "bootloader"; } );
            };"#,
        );

        let members = MemberList::for_software(&tree, true);
        assert_eq!(
            members.into_vec(),
            vec!["sw-description", "sw-description.sig", "rootfs.img", "post.sh", "extra.tar"]
        );
    }

    #[test]
    fn test_shared_artifact_listed_once() {
        let tree = software(
            r#"software = {
                copy1 = { images = ( { filename = "rootfs.img"; volume = "a"; } ); };
                copy2 = { images = ( { filename = "rootfs.img"; volume = "b"; } ); };
                scripts = ( { filename = "post.sh"; } );
            };"#,
        );

        let members = MemberList::for_software(&tree, false);
        assert_eq!(members.as_slice(), &["sw-description", "rootfs.img", "post.sh"]);
    }
}
