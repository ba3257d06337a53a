use std::collections::VecDeque;

use node_globals_swc_plugin::{
    EntropySource, IssuedTraceIds, RebindError, Tag, TraceIdTransform, UnitData, TRACE_ID_ATTR,
};
use swc_core::{
    common::{sync::Lrc, FileName, SourceMap, DUMMY_SP},
    ecma::{
        ast::*,
        parser::{parse_file_as_program, Syntax, TsSyntax},
        visit::{Visit, VisitMut, VisitMutWith, VisitWith},
    },
};

/// Replays `draws`, then repeats the last one.
struct Scripted {
    draws: VecDeque<u64>,
    last: u64,
}

impl Scripted {
    fn new(draws: &[u64]) -> Self {
        Self {
            draws: draws.iter().copied().collect(),
            last: 0,
        }
    }
}

impl EntropySource for Scripted {
    fn timestamp(&mut self) -> u64 {
        0
    }

    fn next_u64(&mut self) -> u64 {
        if let Some(next) = self.draws.pop_front() {
            self.last = next;
        }
        self.last
    }
}

fn parse(src: &str) -> Program {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(FileName::Anon.into(), src.to_string());
    parse_file_as_program(
        &fm,
        Syntax::Typescript(TsSyntax {
            tsx: true,
            ..Default::default()
        }),
        Default::default(),
        None,
        &mut vec![],
    )
    .unwrap()
}

/// `(element, position of the trace attribute, its value)` per opening element.
#[derive(Default)]
struct TraceAttrs(Vec<(String, Option<usize>, Option<String>)>);

impl Visit for TraceAttrs {
    fn visit_jsx_opening_element(&mut self, node: &JSXOpeningElement) {
        let name = match &node.name {
            JSXElementName::Ident(i) => i.sym.to_string(),
            _ => String::new(),
        };
        let found = node.attrs.iter().enumerate().find_map(|(idx, attr)| match attr {
            JSXAttrOrSpread::JSXAttr(JSXAttr {
                name: JSXAttrName::Ident(n),
                value,
                ..
            }) if &*n.sym == TRACE_ID_ATTR => {
                let value = match value {
                    Some(JSXAttrValue::Lit(Lit::Str(s))) => Some(s.value.to_string()),
                    _ => None,
                };
                Some((idx, value))
            }
            _ => None,
        });
        self.0.push((
            name,
            found.as_ref().map(|(idx, _)| *idx),
            found.and_then(|(_, value)| value),
        ));
        node.visit_children_with(self);
    }
}

fn trace_attrs(program: &Program) -> Vec<(String, Option<usize>, Option<String>)> {
    let mut attrs = TraceAttrs::default();
    program.visit_with(&mut attrs);
    attrs.0
}

fn run(program: &mut Program, entropy: &mut dyn EntropySource) -> Result<usize, RebindError> {
    let tag = Tag::<IssuedTraceIds>::issue("test/trace-ids");
    let mut data = UnitData::new();
    TraceIdTransform::new(entropy, &mut data, &tag).run(program)
}

#[test]
fn every_element_gets_a_leading_trace_attribute() {
    let mut program = parse("const el = <div className=\"a\"><span a=\"1\" /></div>;");
    let issued = run(&mut program, &mut Scripted::new(&[1, 2])).unwrap();
    assert_eq!(issued, 2);
    assert_eq!(
        trace_attrs(&program),
        vec![
            ("div".to_string(), Some(0), Some("00000001".to_string())),
            ("span".to_string(), Some(0), Some("00000002".to_string())),
        ]
    );
}

#[test]
fn existing_trace_attributes_are_kept() {
    let mut program = parse("<main><p __uuid=\"keep\" /><p /></main>;");
    let issued = run(&mut program, &mut Scripted::new(&[7, 8])).unwrap();
    assert_eq!(issued, 2);
    let attrs = trace_attrs(&program);
    assert_eq!(attrs[1], ("p".to_string(), Some(0), Some("keep".to_string())));
    assert_eq!(attrs[2].2.as_deref(), Some("00000008"));
}

struct Synthesize;

impl VisitMut for Synthesize {
    fn visit_mut_jsx_opening_element(&mut self, node: &mut JSXOpeningElement) {
        if matches!(&node.name, JSXElementName::Ident(i) if &*i.sym == "Generated") {
            node.span = DUMMY_SP;
        }
        node.visit_mut_children_with(self);
    }
}

#[test]
fn generated_elements_are_skipped() {
    let mut program = parse("<div><Generated /></div>;");
    program.visit_mut_with(&mut Synthesize);
    let issued = run(&mut program, &mut Scripted::new(&[3])).unwrap();
    assert_eq!(issued, 1);
    let attrs = trace_attrs(&program);
    assert_eq!(attrs[0].1, Some(0));
    assert_eq!(attrs[1], ("Generated".to_string(), None, None));
}

#[test]
fn duplicate_ids_are_redrawn() {
    let mut program = parse("<a><b /></a>;");
    let issued = run(&mut program, &mut Scripted::new(&[5, 5, 6])).unwrap();
    assert_eq!(issued, 2);
    let ids: Vec<_> = trace_attrs(&program).into_iter().filter_map(|a| a.2).collect();
    assert_eq!(ids, vec!["00000005", "00000006"]);
}

#[test]
fn id_search_gives_up_after_max_attempts() {
    let tag = Tag::<IssuedTraceIds>::issue("test/trace-ids");
    let mut data = UnitData::new();
    let mut entropy = Scripted::new(&[4]);
    let mut program = parse("<a><b /></a>;");
    let err = TraceIdTransform::new(&mut entropy, &mut data, &tag)
        .with_max_attempts(3)
        .run(&mut program)
        .unwrap_err();
    assert_eq!(err, RebindError::TraceIdExhausted { attempts: 3 });
}

#[test]
fn programs_without_jsx_are_untouched() {
    let src = "const a = 1 < 2;";
    let mut program = parse(src);
    assert_eq!(run(&mut program, &mut Scripted::new(&[])).unwrap(), 0);
    assert_eq!(program, parse(src));
}
