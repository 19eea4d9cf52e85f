use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::client::ClientIdentity;
use crate::error::Error;

const NAME: &str = "tpl";

pub type Vars = BTreeMap<String, serde_yaml::Value>;


/// A template parsed once and rendered once per client.
#[derive(Debug)]
pub struct Template {
    tera: tera::Tera,
}

#[derive(Serialize)]
struct RenderContext<'a> {
    client: &'a ClientIdentity,
    vars: &'a Vars,
}

impl Template {
    pub fn parse(path: &Path, body: &str) -> Result<Self, Error> {
        let mut tera = tera::Tera::default();
        tera.autoescape_on(vec![]);
        tera.add_raw_template(NAME, body)
            .map_err(|source| Error::TemplateParse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self { tera })
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let body = std::fs::read_to_string(path)
            .map_err(|err| Error::io("can't open template", path, err))?;
        Self::parse(path, &body)
    }

    /// Render into a fresh buffer. Shared state is never touched.
    pub fn render(&self, client: &ClientIdentity, vars: &Vars) -> Result<Arc<[u8]>, Error> {
        let render_err = |source| Error::TemplateRender {
            host: client.host.clone(),
            source,
        };
        let context = tera::Context::from_serialize(RenderContext { client, vars })
            .map_err(render_err)?;
        let rendered = self.tera.render(NAME, &context).map_err(render_err)?;
        Ok(Arc::from(rendered.into_bytes()))
    }
}


/// Read a YAML mapping of template variables.
pub fn load_vars(path: &Path) -> Result<Vars, Error> {
    let data = std::fs::read_to_string(path)
        .map_err(|err| Error::io("can't read variables", path, err))?;
    if data.trim().is_empty() {
        return Ok(Vars::new());
    }
    serde_yaml::from_str(&data).map_err(|source| Error::Vars {
        path: path.to_path_buf(),
        source,
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    fn identity(host: &str) -> ClientIdentity {
        ClientIdentity {
            host: host.to_string(),
            user: Some("deploy".to_string()),
            port: None,
        }
    }

    fn vars(yaml: &str) -> Vars {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn renders_client_and_nested_vars() {
        let tpl = Template::parse(
            Path::new("app.conf"),
            "host={{ client.host }} user={{ client.user }} db={{ vars.db.host }}:{{ vars.db.port }}",
        )
        .unwrap();

        let out = tpl
            .render(&identity("web1"), &vars("db:\n  host: pg\n  port: 5432\n"))
            .unwrap();
        assert_eq!(&*out, b"host=web1 user=deploy db=pg:5432");
    }

    #[test]
    fn each_client_gets_its_own_buffer() {
        let tpl = Template::parse(Path::new("t"), "{{ client.host }}").unwrap();
        let vars = Vars::new();
        let a = tpl.render(&identity("web1"), &vars).unwrap();
        let b = tpl.render(&identity("web2"), &vars).unwrap();
        let again = tpl.render(&identity("web1"), &vars).unwrap();
        assert_eq!(&*a, b"web1");
        assert_eq!(&*b, b"web2");
        assert_eq!(a, again);
    }

    #[test]
    fn html_is_not_escaped() {
        let tpl = Template::parse(Path::new("t"), "{{ vars.tag }}").unwrap();
        let out = tpl.render(&identity("web1"), &vars("tag: <a & b>")).unwrap();
        assert_eq!(&*out, b"<a & b>");
    }

    #[test]
    fn parse_error_names_the_file() {
        let err = Template::parse(Path::new("broken.tpl"), "{{ unclosed").unwrap_err();
        assert!(matches!(err, Error::TemplateParse { .. }));
        assert!(err.to_string().contains("broken.tpl"));
    }

    #[test]
    fn render_error_names_the_host() {
        let tpl = Template::parse(Path::new("t"), "{{ vars.missing }}").unwrap();
        let err = tpl.render(&identity("web3"), &Vars::new()).unwrap_err();
        assert!(matches!(err, Error::TemplateRender { ref host, .. } if host == "web3"));
    }

    #[test]
    fn vars_decode_error_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vars.yml");
        std::fs::write(&path, "- just\n- a list\n").unwrap();
        let err = load_vars(&path).unwrap_err();
        assert!(matches!(err, Error::Vars { .. }));
        assert!(err.to_string().contains("vars.yml"));
    }
}
