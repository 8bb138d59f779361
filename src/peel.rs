use crate::error::{Error, Result};
use crate::hash::ObjectId;
use crate::obj::{Commit, Object, ObjectKind, Tree};
use crate::repo::Repository;
use crate::signature::Signature;

/// peel a commit/tag/tree id to something more specific, reading through
/// the repository's object store as needed. grounded in the teacher's
/// `Peel<'rcx>` trait; generalized to drop the arena lifetime parameter,
/// since records here are plain owned values rather than arena-borrowed
/// ones.
pub trait Peel {
    type Peeled;
    fn peel(&self, repo: &Repository) -> Result<Self::Peeled>;
}

impl Peel for ObjectId {
    type Peeled = Commit;

    fn peel(&self, repo: &Repository) -> Result<Commit> {
        (*repo.read_obj(*self)?).clone().into_commit()
    }
}

impl Peel for Commit {
    type Peeled = Tree;

    fn peel(&self, repo: &Repository) -> Result<Tree> {
        (*repo.read_obj(self.tree)?).clone().into_tree()
    }
}

/// the tagger/message an annotated tag object carries (spec section 3's
/// `Tag record`), surfaced separately from the tag object itself once a
/// reference has been peeled down to a commit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Annotation {
    pub tagger: Option<Signature>,
    pub message: Option<String>,
}

/// the result of peeling a tag reference's target down to a commit (spec
/// 4.5 "Tag resolution"): the commit it ultimately names, the annotated tag
/// object's own id if one exists in the chain, and that tag's annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTag {
    pub commit_id: ObjectId,
    pub tag_object_id: Option<ObjectId>,
    pub annotation: Option<Annotation>,
}

/// bounds the tag -> tag -> ... -> commit chain walked by [`peel_tag`]. a
/// valid repository never nests tags this deep; this exists purely to turn
/// a corrupt/cyclic chain into an error instead of an infinite loop.
const MAX_TAG_PEEL_DEPTH: u32 = 10;

/// follows `target` through zero or more annotated tag objects down to its
/// final non-tag object (spec 4.5: "if it resolves to a tag object, parse
/// that and recursively follow until a non-tag is reached").
///
/// returns `Ok(None)` ("Absent") when the chain bottoms out at something
/// other than a commit - per the documented Open Question decision, the
/// synthetic commit-only annotation behavior is preserved only for commit
/// targets; a lightweight tag (no tag object at all) pointing directly at a
/// tree or blob is reported as absent rather than synthesizing a fake
/// commit-kind annotation.
pub fn peel_tag(repo: &Repository, target: ObjectId) -> Result<Option<ResolvedTag>> {
    let mut oid = target;
    let mut tag_object_id = None;
    let mut annotation = None;

    for _ in 0..MAX_TAG_PEEL_DEPTH {
        let obj = repo.read_obj(oid)?;
        match &*obj {
            Object::Tag(tag) => {
                if tag_object_id.is_none() {
                    tag_object_id = Some(oid);
                    annotation =
                        Some(Annotation { tagger: tag.tagger.clone(), message: tag.message.clone() });
                }
                oid = tag.target;
            }
            Object::Commit(_) => return Ok(Some(ResolvedTag { commit_id: oid, tag_object_id, annotation })),
            _ => return Ok(None),
        }
    }
    Err(Error::malformed_object(target, "tag chain exceeds maximum peel depth"))
}
