//! Git `.mailmap` files.
//!
//! Every line holds one or two `Name <email>` addresses:
//!
//! ```text
//! Proper Name <proper@example.com>
//! <proper@example.com> <commit@example.com>
//! Proper Name <proper@example.com> <commit@example.com>
//! Proper Name <proper@example.com> Commit Name <commit@example.com>
//! ```
//!
//! The first address is canonical and keys the individual; the second one
//! becomes another identity of it. In organization mode the first address
//! names an organization instead (`Org <ignored> Name <email>`).

use std::collections::HashMap;

use tracing::warn;

use sortinghat_core::{Error, model::NewIdentity};

use crate::model::{ImportData, ImportEnrollment, ImportIndividual};

pub const SOURCE: &str = "mailmap";

/// Organization name that means "no affiliation".
const UNAFFILIATED: &str = "Unaffiliated";

#[derive(Debug, Clone, Copy, Default)]
pub struct MailmapParser {
  has_orgs: bool,
}

/// A `Name <email>` pair; either part may be empty.
#[derive(Debug, PartialEq, Eq)]
struct Address<'a> {
  name:  &'a str,
  email: &'a str,
}

impl Address<'_> {
  fn identity(&self) -> NewIdentity {
    let mut identity = NewIdentity::new(SOURCE).email(self.email);
    if !self.name.is_empty() {
      identity = identity.name(self.name);
    }
    identity
  }
}

impl MailmapParser {
  pub fn new() -> Self { Self::default() }

  /// Read the first address of every line as an organization.
  pub fn has_orgs(mut self, on: bool) -> Self {
    self.has_orgs = on;
    self
  }

  pub fn parse(&self, stream: &str) -> ImportData {
    let mut data = ImportData::default();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (n, raw) in stream.lines().enumerate() {
      let line = n + 1;
      let trimmed = raw.trim();
      if trimmed.is_empty() || trimmed.starts_with('#') {
        continue;
      }
      let addresses = match addresses(trimmed) {
        Ok(addresses) => addresses,
        Err(cause) => {
          reject(&mut data.rejected, line, cause);
          continue;
        }
      };

      let (key, identities, enrollment) = if self.has_orgs {
        let [org, person] = addresses.as_slice() else {
          reject(&mut data.rejected, line, "expected an organization and a person".to_owned());
          continue;
        };
        if person.email.is_empty() {
          reject(&mut data.rejected, line, "empty email address".to_owned());
          continue;
        }
        let enrollment = (org.name != UNAFFILIATED && !org.name.is_empty())
          .then(|| ImportEnrollment::new(org.name));
        (person.email, vec![person.identity()], enrollment)
      } else {
        if addresses.iter().any(|a| a.email.is_empty()) {
          reject(&mut data.rejected, line, "empty email address".to_owned());
          continue;
        }
        match addresses.as_slice() {
          [canonical, alias, ..] => {
            let name = if alias.name.is_empty() { canonical.name } else { alias.name };
            let alias = Address { name, email: alias.email };
            (canonical.email, vec![canonical.identity(), alias.identity()], None)
          }
          [one] => (one.email, vec![one.identity()], None),
          [] => continue,
        }
      };

      let key = key.to_lowercase();
      let i = match index.get(&key) {
        Some(&i) => i,
        None => {
          index.insert(key, data.individuals.len());
          data.individuals.push(ImportIndividual::default());
          data.individuals.len() - 1
        }
      };
      let individual = &mut data.individuals[i];
      for identity in identities {
        if !individual.identities.contains(&identity) {
          individual.identities.push(identity);
        }
      }
      if let Some(enrollment) = enrollment
        && !individual.enrollments.contains(&enrollment)
      {
        individual.enrollments.push(enrollment);
      }
    }

    data
  }
}

/// Split a line on `>` into at most two addresses. Anything after the last
/// address is ignored.
fn addresses(line: &str) -> Result<Vec<Address<'_>>, String> {
  let mut out = Vec::with_capacity(2);
  let mut rest = line;
  while out.len() < 2 {
    let Some((head, tail)) = rest.split_once('>') else { break };
    let Some((name, email)) = head.split_once('<') else {
      return Err(format!("missing '<' in {line:?}"));
    };
    out.push(Address { name: name.trim(), email: email.trim() });
    rest = tail;
  }
  if out.is_empty() {
    return Err(format!("no address in {line:?}"));
  }
  Ok(out)
}

fn reject(rejected: &mut Vec<Error>, line: usize, cause: String) {
  warn!(line, %cause, "skipping mailmap line");
  rejected.push(Error::InvalidFormat { cause, line: Some(line) });
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn splits_addresses() {
    assert_eq!(
      addresses("Jane Doe <jane@example.com> <jdoe@old.example.com>").unwrap(),
      vec![
        Address { name: "Jane Doe", email: "jane@example.com" },
        Address { name: "", email: "jdoe@old.example.com" },
      ]
    );
    assert!(addresses("Jane Doe jane@example.com").is_err());
    assert_eq!(addresses("Jane <>").unwrap(), vec![Address { name: "Jane", email: "" }]);
  }

  #[test]
  fn aliases_share_the_canonical_individual() {
    let stream = "# comment\n\
                  Jane Doe <jane@example.com>\n\
                  Jane Doe <jane@example.com> <jdoe@old.example.com>\n\
                  <jane@example.com> Janie <janie@example.com>\n\
                  John Smith <jsmith@example.com>\n";
    let data = MailmapParser::new().parse(stream);

    assert!(data.rejected.is_empty());
    assert_eq!(data.individuals.len(), 2);
    assert_eq!(
      data.individuals[0].identities,
      vec![
        NewIdentity::new("mailmap").email("jane@example.com").name("Jane Doe"),
        NewIdentity::new("mailmap").email("jdoe@old.example.com").name("Jane Doe"),
        NewIdentity::new("mailmap").email("jane@example.com"),
        NewIdentity::new("mailmap").email("janie@example.com").name("Janie"),
      ]
    );
    assert!(data.individuals.iter().all(|i| i.enrollments.is_empty()));
  }

  #[test]
  fn organization_mode_enrolls_and_skips_unaffiliated() {
    let stream = "Example <> Jane Doe <jane@example.com>\n\
                  Unaffiliated <> John Smith <jsmith@example.com>\n\
                  Bitergia <x> Jane Doe <jane@example.com>\n\
                  Lonely <lonely@example.com>\n";
    let data = MailmapParser::new().has_orgs(true).parse(stream);

    assert_eq!(data.rejected.len(), 1);
    assert_eq!(data.individuals.len(), 2);
    assert_eq!(
      data.individuals[0].enrollments,
      vec![ImportEnrollment::new("Example"), ImportEnrollment::new("Bitergia")]
    );
    assert_eq!(
      data.individuals[0].identities,
      vec![NewIdentity::new("mailmap").email("jane@example.com").name("Jane Doe")]
    );
    assert!(data.individuals[1].enrollments.is_empty());
  }
}
