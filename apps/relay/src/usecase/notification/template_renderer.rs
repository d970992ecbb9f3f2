//! # テンプレートレンダラー
//!
//! tera テンプレートエンジンで通知メールの件名・プレーンテキスト本文・HTML 本文を生成する。
//!
//! ## 設計方針
//!
//! - **3 ブロック契約**: テンプレートソースは `subject` / `plainBody` / `htmlBody` の
//!   3 ブロックをすべて定義する。欠けていれば構文エラーと同じくパースエラーにする
//! - **ブロックごとに独立して実行**: ブロックだけを持つレイアウトを継承した子テンプレートを
//!   ブロックごとに生成し、対象以外のブロックは描画しない。ブロック外のテキストは出力されない
//! - **HTML 本文のみエスケープ**: 子テンプレート名の拡張子（`.html`）で tera の自動エスケープを有効にする
//! - **組み込みテンプレートは `include_str!` で埋め込み**、起動時に 1 度だけパースする
//! - **カスタムテンプレートはキャッシュしない**: 呼び出しごとに新しい `Tera` でパースする

use std::error::Error as _;

use pingmailer_domain::notification::{
    RenderedMessage,
    TemplateBlock,
    TemplateContext,
    TemplateError,
};
use serde_json::{Map, Value};
use tera::{Context, Template, Tera};

/// カスタムテンプレートの登録名
const CUSTOM_TEMPLATE_NAME: &str = "custom";

/// 組み込みテンプレート
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinTemplate {
    Welcome,
}

impl BuiltinTemplate {
    const ALL: [BuiltinTemplate; 1] = [Self::Welcome];

    pub fn name(self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
        }
    }

    fn source(self) -> &'static str {
        match self {
            Self::Welcome => include_str!("../../../templates/notifications/welcome.tera"),
        }
    }
}

/// レンダリング対象のテンプレート
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// 組み込みテンプレート
    Builtin(BuiltinTemplate),
    /// リクエストで渡されたテンプレートソース
    Inline(String),
}

/// テンプレートに渡すデータ
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateData {
    /// デフォルトコンテキスト `{name, email, appName}`
    Default(TemplateContext),
    /// 呼び出し元が指定した任意のキー・値
    Custom(Map<String, Value>),
}

impl TemplateData {
    fn to_context(&self) -> Context {
        let mut context = Context::new();
        match self {
            TemplateData::Default(default) => {
                context.insert("name", &default.name);
                context.insert("email", &default.email);
                context.insert("appName", &default.app_name);
            }
            TemplateData::Custom(data) => {
                for (key, value) in data {
                    context.insert(key.as_str(), value);
                }
            }
        }
        context
    }
}

/// テンプレートレンダラー
pub struct TemplateRenderer {
    builtin: Tera,
}

impl TemplateRenderer {
    /// 新しいレンダラーインスタンスを作成
    ///
    /// 組み込みテンプレートをすべてパースして登録する。
    pub fn new() -> Result<Self, TemplateError> {
        let mut builtin = Tera::default();
        for template in BuiltinTemplate::ALL {
            register(&mut builtin, template.name(), template.source())?;
        }

        Ok(Self { builtin })
    }

    /// テンプレートをレンダリングする
    ///
    /// 出力の前後の空白は取り除く。
    pub fn render(
        &self,
        source: &TemplateSource,
        data: &TemplateData,
    ) -> Result<RenderedMessage, TemplateError> {
        let context = data.to_context();

        match source {
            TemplateSource::Builtin(template) => {
                render_blocks(&self.builtin, template.name(), &context)
            }
            TemplateSource::Inline(source) => {
                let mut engine = Tera::default();
                register(&mut engine, CUSTOM_TEMPLATE_NAME, source)?;
                render_blocks(&engine, CUSTOM_TEMPLATE_NAME, &context)
            }
        }
    }
}

/// レイアウト名（対象ブロックだけを持つ親テンプレート）
fn layout_name(name: &str, block: TemplateBlock) -> String {
    format!("{name}/__layout/{block}")
}

/// ブロックごとの子テンプレート名
///
/// `htmlBody` だけ `.html` にして自動エスケープを有効にする。
fn view_name(name: &str, block: TemplateBlock) -> String {
    match block {
        TemplateBlock::HtmlBody => format!("{name}/{block}.html"),
        TemplateBlock::Subject | TemplateBlock::PlainBody => format!("{name}/{block}.txt"),
    }
}

/// テンプレートソースを `engine` に登録する
fn register(engine: &mut Tera, name: &str, source: &str) -> Result<(), TemplateError> {
    ensure_required_blocks(name, source)?;

    let mut templates = Vec::with_capacity(TemplateBlock::ALL.len() * 2);
    for block in TemplateBlock::ALL {
        let layout = layout_name(name, block);
        templates.push((
            layout.clone(),
            format!("{{% block {block} %}}{{% endblock {block} %}}"),
        ));
        templates.push((
            view_name(name, block),
            format!("{{% extends \"{layout}\" %}}{source}"),
        ));
    }

    engine
        .add_raw_templates(templates)
        .map_err(|e| TemplateError::Parse(error_chain(&e)))
}

/// 3 ブロックがすべて定義されているか確認する
///
/// ソース単体をパースしてブロック定義を調べる。コメントや `raw` 内のタグは数えない。
fn ensure_required_blocks(name: &str, source: &str) -> Result<(), TemplateError> {
    let parsed =
        Template::new(name, None, source).map_err(|e| TemplateError::Parse(error_chain(&e)))?;

    let missing: Vec<&str> = TemplateBlock::ALL
        .iter()
        .map(|block| block.name())
        .filter(|block| !parsed.blocks.contains_key(*block))
        .collect();
    if !missing.is_empty() {
        return Err(TemplateError::Parse(format!(
            "missing required block(s): {}",
            missing.join(", ")
        )));
    }

    Ok(())
}

fn render_blocks(
    engine: &Tera,
    name: &str,
    context: &Context,
) -> Result<RenderedMessage, TemplateError> {
    let render = |block: TemplateBlock| {
        engine
            .render(&view_name(name, block), context)
            .map(|output| output.trim().to_string())
            .map_err(|e| TemplateError::Execution {
                block,
                reason: error_chain(&e),
            })
    };

    Ok(RenderedMessage {
        subject:    render(TemplateBlock::Subject)?,
        plain_body: render(TemplateBlock::PlainBody)?,
        html_body:  render(TemplateBlock::HtmlBody)?,
    })
}

/// tera のエラーは最上位のメッセージが汎用的なので、原因の連鎖をつなげて返す
fn error_chain(error: &tera::Error) -> String {
    let mut messages = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        messages.push(cause.to_string());
        source = cause.source();
    }
    messages.join(": ")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn default_data() -> TemplateData {
        TemplateData::Default(TemplateContext {
            name:     "User".to_string(),
            email:    "a@b.com".to_string(),
            app_name: "Application".to_string(),
        })
    }

    fn custom_data(value: Value) -> TemplateData {
        match value {
            Value::Object(map) => TemplateData::Custom(map),
            other => panic!("object expected: {other}"),
        }
    }

    const CUSTOM: &str = r#"
{% block subject %}Order {{ order_id }} shipped{% endblock subject %}
{% block plainBody %}Hello {{ customer }}, your order {{ order_id }} is on its way.{% endblock plainBody %}
{% block htmlBody %}<p>Hello {{ customer }}, your order <b>{{ order_id }}</b> is on its way.</p>{% endblock htmlBody %}
"#;

    #[test]
    fn test_組み込みwelcomeテンプレートをデフォルトコンテキストで描画する() {
        let renderer = TemplateRenderer::new().unwrap();

        let rendered = renderer
            .render(&TemplateSource::Builtin(BuiltinTemplate::Welcome), &default_data())
            .unwrap();

        assert_eq!(rendered.subject, "Welcome to Application, User!");
        assert!(rendered.plain_body.starts_with("Hi User,"));
        assert!(rendered.plain_body.contains("a@b.com"));
        assert!(rendered.html_body.contains("<strong>Application</strong>"));
        // 他のブロックの内容は混ざらない
        assert!(!rendered.plain_body.contains("<p>"));
        assert!(!rendered.html_body.contains("Welcome to"));
    }

    #[test]
    fn test_同じテンプレートとデータの描画結果は毎回同一() {
        let renderer = TemplateRenderer::new().unwrap();
        let source = TemplateSource::Inline(CUSTOM.to_string());
        let data = custom_data(json!({"order_id": "A-42", "customer": "Kim"}));

        let first = renderer.render(&source, &data).unwrap();
        let second = renderer.render(&source, &data).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_カスタムテンプレートをカスタムデータで描画する() {
        let renderer = TemplateRenderer::new().unwrap();

        let rendered = renderer
            .render(
                &TemplateSource::Inline(CUSTOM.to_string()),
                &custom_data(json!({"order_id": "A-42", "customer": "Kim"})),
            )
            .unwrap();

        assert_eq!(
            rendered,
            RenderedMessage {
                subject:    "Order A-42 shipped".to_string(),
                plain_body: "Hello Kim, your order A-42 is on its way.".to_string(),
                html_body:  "<p>Hello Kim, your order <b>A-42</b> is on its way.</p>".to_string(),
            }
        );
    }

    #[test]
    fn test_html本文だけエスケープされる() {
        let renderer = TemplateRenderer::new().unwrap();
        let source = TemplateSource::Inline(
            "{% block subject %}Hi {{ name }}{% endblock subject %}\
             {% block plainBody %}Hi {{ name }}{% endblock plainBody %}\
             {% block htmlBody %}Hi {{ name }}{% endblock htmlBody %}"
                .to_string(),
        );

        let rendered = renderer
            .render(&source, &custom_data(json!({"name": "<b>Bob</b>"})))
            .unwrap();

        assert_eq!(rendered.subject, "Hi <b>Bob</b>");
        assert_eq!(rendered.plain_body, "Hi <b>Bob</b>");
        assert!(rendered.html_body.starts_with("Hi &lt;b&gt;Bob"));
    }

    #[test]
    fn test_ブロック外のテキストは出力されない() {
        let renderer = TemplateRenderer::new().unwrap();
        let source = TemplateSource::Inline(format!("preamble text\n{CUSTOM}\ntrailer"));

        let rendered = renderer
            .render(
                &source,
                &custom_data(json!({"order_id": "A-42", "customer": "Kim"})),
            )
            .unwrap();

        assert_eq!(rendered.subject, "Order A-42 shipped");
        assert!(!rendered.plain_body.contains("preamble"));
        assert!(!rendered.html_body.contains("trailer"));
    }

    #[test]
    fn test_必須ブロックが欠けていればパースエラーになる() {
        let renderer = TemplateRenderer::new().unwrap();
        let source = TemplateSource::Inline(
            "{% block subject %}Hi{% endblock subject %}\
             {% block plainBody %}Hi{% endblock plainBody %}"
                .to_string(),
        );

        let result = renderer.render(&source, &default_data());

        assert_eq!(
            result,
            Err(TemplateError::Parse(
                "missing required block(s): htmlBody".to_string()
            ))
        );
    }

    #[rstest]
    #[case::コメント内("{# {% block htmlBody %}x{% endblock htmlBody %} #}")]
    #[case::raw内("{% raw %}{% block htmlBody %}x{% endblock htmlBody %}{% endraw %}")]
    fn test_コメントやraw内のブロックは定義に数えない(#[case] html_part: &str) {
        let renderer = TemplateRenderer::new().unwrap();
        let source = TemplateSource::Inline(format!(
            "{{% block subject %}}S{{% endblock subject %}}\
             {{% block plainBody %}}P{{% endblock plainBody %}}{html_part}"
        ));

        let result = renderer.render(&source, &default_data());

        assert_eq!(
            result,
            Err(TemplateError::Parse(
                "missing required block(s): htmlBody".to_string()
            ))
        );
    }

    #[test]
    fn test_構文エラーはパースエラーになる() {
        let renderer = TemplateRenderer::new().unwrap();
        let source = TemplateSource::Inline(
            "{% block subject %}{{ name {% endblock subject %}\
             {% block plainBody %}x{% endblock plainBody %}\
             {% block htmlBody %}x{% endblock htmlBody %}"
                .to_string(),
        );

        let result = renderer.render(&source, &default_data());

        assert!(matches!(result, Err(TemplateError::Parse(_))));
    }

    #[test]
    fn test_未定義の変数は実行エラーになりブロック名を含む() {
        let renderer = TemplateRenderer::new().unwrap();

        let result = renderer.render(
            &TemplateSource::Inline(CUSTOM.to_string()),
            &custom_data(json!({"customer": "Kim"})),
        );

        match result {
            Err(TemplateError::Execution { block, reason }) => {
                assert_eq!(block, TemplateBlock::Subject);
                assert!(reason.contains("order_id"), "reason: {reason}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_カスタムテンプレートでデフォルトコンテキストを使える() {
        let renderer = TemplateRenderer::new().unwrap();
        let source = TemplateSource::Inline(
            "{% block subject %}{{ appName }}{% endblock subject %}\
             {% block plainBody %}{{ name }}{% endblock plainBody %}\
             {% block htmlBody %}{{ email }}{% endblock htmlBody %}"
                .to_string(),
        );

        let rendered = renderer.render(&source, &default_data()).unwrap();

        assert_eq!(rendered.subject, "Application");
        assert_eq!(rendered.plain_body, "User");
        assert_eq!(rendered.html_body, "a@b.com");
    }
}
