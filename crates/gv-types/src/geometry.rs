//! Planar geometries and their Well-Known Text form.
//!
//! Only the simple-feature shapes needed for versioned feature attributes are
//! modelled: points, line strings, polygons, and their multi variants.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;
use crate::error::{TypeError, TypeResult};

/// A 2D coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl Coordinate {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A simple-feature geometry.
///
/// Polygons are stored as a list of rings, the first one being the shell and
/// the rest holes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Point(Coordinate),
    LineString(Vec<Coordinate>),
    Polygon(Vec<Vec<Coordinate>>),
    MultiPoint(Vec<Coordinate>),
    MultiLineString(Vec<Vec<Coordinate>>),
    MultiPolygon(Vec<Vec<Vec<Coordinate>>>),
}

impl Geometry {
    /// Convenience constructor for a point.
    pub fn point(x: f64, y: f64) -> Self {
        Self::Point(Coordinate::new(x, y))
    }

    /// Convenience constructor for a line string from `(x, y)` pairs.
    pub fn line_string(coords: &[(f64, f64)]) -> Self {
        Self::LineString(coords.iter().map(|&(x, y)| Coordinate::new(x, y)).collect())
    }

    /// The geometry type name, as used in the coordinate tokenization.
    pub fn geometry_type(&self) -> &'static str {
        match self {
            Self::Point(_) => "Point",
            Self::LineString(_) => "LineString",
            Self::Polygon(_) => "Polygon",
            Self::MultiPoint(_) => "MultiPoint",
            Self::MultiLineString(_) => "MultiLineString",
            Self::MultiPolygon(_) => "MultiPolygon",
        }
    }

    /// Structural view: sub-geometries, each a list of paths (rings for
    /// polygons), each a list of coordinates.
    pub fn parts(&self) -> Vec<Vec<Vec<Coordinate>>> {
        match self {
            Self::Point(c) => vec![vec![vec![*c]]],
            Self::LineString(cs) => vec![vec![cs.clone()]],
            Self::Polygon(rings) => vec![rings.clone()],
            Self::MultiPoint(cs) => cs.iter().map(|c| vec![vec![*c]]).collect(),
            Self::MultiLineString(lines) => lines.iter().map(|l| vec![l.clone()]).collect(),
            Self::MultiPolygon(polys) => polys.clone(),
        }
    }

    /// Inverse of [`Geometry::parts`].
    pub fn from_parts(geometry_type: &str, parts: Vec<Vec<Vec<Coordinate>>>) -> TypeResult<Self> {
        let invalid = |reason: &str| TypeError::InvalidGeometry(format!("{geometry_type}: {reason}"));
        match geometry_type {
            "Point" => {
                let coord = single(single(single(parts).ok_or_else(|| invalid("one part"))?)
                    .ok_or_else(|| invalid("one path"))?)
                .ok_or_else(|| invalid("one coordinate"))?;
                Ok(Self::Point(coord))
            }
            "LineString" => {
                if parts.is_empty() {
                    return Ok(Self::LineString(Vec::new()));
                }
                let path = single(single(parts).ok_or_else(|| invalid("one part"))?)
                    .ok_or_else(|| invalid("one path"))?;
                Ok(Self::LineString(path))
            }
            "Polygon" => {
                if parts.is_empty() {
                    return Ok(Self::Polygon(Vec::new()));
                }
                Ok(Self::Polygon(single(parts).ok_or_else(|| invalid("one part"))?))
            }
            "MultiPoint" => parts
                .into_iter()
                .map(|p| {
                    single(single(p).ok_or_else(|| invalid("one path per point"))?)
                        .ok_or_else(|| invalid("one coordinate per point"))
                })
                .collect::<TypeResult<Vec<_>>>()
                .map(Self::MultiPoint),
            "MultiLineString" => parts
                .into_iter()
                .map(|p| single(p).ok_or_else(|| invalid("one path per line")))
                .collect::<TypeResult<Vec<_>>>()
                .map(Self::MultiLineString),
            "MultiPolygon" => Ok(Self::MultiPolygon(parts)),
            other => Err(TypeError::InvalidGeometry(format!("unknown geometry type {other}"))),
        }
    }

    /// All coordinates in traversal order.
    pub fn coordinates(&self) -> Vec<Coordinate> {
        self.parts().into_iter().flatten().flatten().collect()
    }

    /// Number of coordinates.
    pub fn num_points(&self) -> usize {
        self.coordinates().len()
    }

    /// Bounding box, or `None` for an empty geometry.
    pub fn envelope(&self) -> Option<Envelope> {
        self.coordinates().iter().fold(None, |acc, c| {
            Envelope::merge(acc, Some(&Envelope::of_point(c.x, c.y)))
        })
    }

    /// Well-Known Text representation.
    pub fn to_wkt(&self) -> String {
        match self {
            Self::Point(c) => format!("POINT ({})", coord_text(c)),
            Self::LineString(cs) => format!("LINESTRING {}", path_text(cs)),
            Self::Polygon(rings) => format!("POLYGON {}", list_text(rings, |r| path_text(r))),
            Self::MultiPoint(cs) => {
                format!("MULTIPOINT {}", list_text(cs, |c| format!("({})", coord_text(c))))
            }
            Self::MultiLineString(lines) => {
                format!("MULTILINESTRING {}", list_text(lines, |l| path_text(l)))
            }
            Self::MultiPolygon(polys) => format!(
                "MULTIPOLYGON {}",
                list_text(polys, |rings| list_text(rings, |r| path_text(r)))
            ),
        }
    }

    /// Parse Well-Known Text.
    pub fn from_wkt(text: &str) -> TypeResult<Self> {
        let mut parser = WktParser::new(text)?;
        let geometry = parser.geometry()?;
        parser.finish()?;
        Ok(geometry)
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wkt())
    }
}

impl FromStr for Geometry {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_wkt(s)
    }
}

fn single<T>(items: Vec<T>) -> Option<T> {
    if items.len() == 1 {
        items.into_iter().next()
    } else {
        None
    }
}

fn coord_text(c: &Coordinate) -> String {
    format!("{} {}", c.x, c.y)
}

fn path_text(cs: &[Coordinate]) -> String {
    list_text(cs, coord_text)
}

fn list_text<T>(items: &[T], f: impl Fn(&T) -> String) -> String {
    if items.is_empty() {
        return "EMPTY".to_string();
    }
    let inner: Vec<String> = items.iter().map(f).collect();
    format!("({})", inner.join(", "))
}

// ---------------------------------------------------------------------------
// WKT parsing
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Word(String),
    Number(f64),
    LParen,
    RParen,
    Comma,
}

struct WktParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl WktParser {
    fn new(text: &str) -> TypeResult<Self> {
        let mut tokens = Vec::new();
        let mut chars = text.chars().peekable();
        while let Some(&ch) = chars.peek() {
            match ch {
                c if c.is_whitespace() => {
                    chars.next();
                }
                '(' => {
                    chars.next();
                    tokens.push(Token::LParen);
                }
                ')' => {
                    chars.next();
                    tokens.push(Token::RParen);
                }
                ',' => {
                    chars.next();
                    tokens.push(Token::Comma);
                }
                c if c.is_ascii_alphabetic() => {
                    let mut word = String::new();
                    while let Some(&c) = chars.peek() {
                        if !c.is_ascii_alphabetic() {
                            break;
                        }
                        word.push(c.to_ascii_uppercase());
                        chars.next();
                    }
                    tokens.push(Token::Word(word));
                }
                c if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                    let mut number = String::new();
                    while let Some(&c) = chars.peek() {
                        if !(c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E')) {
                            break;
                        }
                        number.push(c);
                        chars.next();
                    }
                    let value = number
                        .parse::<f64>()
                        .map_err(|_| TypeError::InvalidGeometry(format!("bad number '{number}'")))?;
                    tokens.push(Token::Number(value));
                }
                other => {
                    return Err(TypeError::InvalidGeometry(format!(
                        "unexpected character '{other}'"
                    )))
                }
            }
        }
        Ok(Self { tokens, pos: 0 })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> TypeResult<Token> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| TypeError::InvalidGeometry("unexpected end of input".into()))?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, expected: Token) -> TypeResult<()> {
        let token = self.next()?;
        if token != expected {
            return Err(TypeError::InvalidGeometry(format!(
                "expected {expected:?}, found {token:?}"
            )));
        }
        Ok(())
    }

    fn finish(&self) -> TypeResult<()> {
        match self.peek() {
            None => Ok(()),
            Some(t) => Err(TypeError::InvalidGeometry(format!("trailing token {t:?}"))),
        }
    }

    fn take_empty(&mut self) -> bool {
        if self.peek() == Some(&Token::Word("EMPTY".into())) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn number(&mut self) -> TypeResult<f64> {
        match self.next()? {
            Token::Number(n) => Ok(n),
            other => Err(TypeError::InvalidGeometry(format!("expected number, found {other:?}"))),
        }
    }

    fn coordinate(&mut self) -> TypeResult<Coordinate> {
        let x = self.number()?;
        let y = self.number()?;
        Ok(Coordinate::new(x, y))
    }

    /// `( item , item ... )` or `EMPTY`.
    fn list<T>(&mut self, mut item: impl FnMut(&mut Self) -> TypeResult<T>) -> TypeResult<Vec<T>> {
        if self.take_empty() {
            return Ok(Vec::new());
        }
        self.expect(Token::LParen)?;
        let mut items = vec![item(self)?];
        loop {
            match self.next()? {
                Token::Comma => items.push(item(self)?),
                Token::RParen => return Ok(items),
                other => {
                    return Err(TypeError::InvalidGeometry(format!(
                        "expected ',' or ')', found {other:?}"
                    )))
                }
            }
        }
    }

    fn path(&mut self) -> TypeResult<Vec<Coordinate>> {
        self.list(Self::coordinate)
    }

    fn rings(&mut self) -> TypeResult<Vec<Vec<Coordinate>>> {
        self.list(Self::path)
    }

    fn multi_point_member(&mut self) -> TypeResult<Coordinate> {
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let c = self.coordinate()?;
            self.expect(Token::RParen)?;
            Ok(c)
        } else {
            self.coordinate()
        }
    }

    fn geometry(&mut self) -> TypeResult<Geometry> {
        let kind = match self.next()? {
            Token::Word(w) => w,
            other => {
                return Err(TypeError::InvalidGeometry(format!(
                    "expected geometry type, found {other:?}"
                )))
            }
        };
        match kind.as_str() {
            "POINT" => {
                self.expect(Token::LParen)?;
                let c = self.coordinate()?;
                self.expect(Token::RParen)?;
                Ok(Geometry::Point(c))
            }
            "LINESTRING" => Ok(Geometry::LineString(self.path()?)),
            "POLYGON" => Ok(Geometry::Polygon(self.rings()?)),
            "MULTIPOINT" => Ok(Geometry::MultiPoint(self.list(Self::multi_point_member)?)),
            "MULTILINESTRING" => Ok(Geometry::MultiLineString(self.rings()?)),
            "MULTIPOLYGON" => Ok(Geometry::MultiPolygon(self.list(Self::rings)?)),
            other => Err(TypeError::InvalidGeometry(format!("unsupported type {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Coordinate> {
        vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(10.0, 0.0),
            Coordinate::new(10.0, 10.0),
            Coordinate::new(0.0, 10.0),
            Coordinate::new(0.0, 0.0),
        ]
    }

    #[test]
    fn point_wkt() {
        let p = Geometry::point(1.5, -2.0);
        assert_eq!(p.to_wkt(), "POINT (1.5 -2)");
        assert_eq!(Geometry::from_wkt("POINT (1.5 -2)").unwrap(), p);
        assert_eq!(Geometry::from_wkt("point(1.5   -2)").unwrap(), p);
    }

    #[test]
    fn line_string_wkt() {
        let l = Geometry::line_string(&[(1.0, 1.0), (2.0, 2.0), (3.0, 1.0)]);
        assert_eq!(l.to_wkt(), "LINESTRING (1 1, 2 2, 3 1)");
        assert_eq!(l.to_string().parse::<Geometry>().unwrap(), l);
    }

    #[test]
    fn polygon_with_hole_wkt() {
        let hole = vec![
            Coordinate::new(2.0, 2.0),
            Coordinate::new(3.0, 2.0),
            Coordinate::new(3.0, 3.0),
            Coordinate::new(2.0, 2.0),
        ];
        let poly = Geometry::Polygon(vec![square(), hole]);
        let wkt = poly.to_wkt();
        assert!(wkt.starts_with("POLYGON ((0 0, 10 0"));
        assert_eq!(Geometry::from_wkt(&wkt).unwrap(), poly);
    }

    #[test]
    fn multi_geometries_wkt() {
        let mp = Geometry::MultiPoint(vec![Coordinate::new(1.0, 2.0), Coordinate::new(3.0, 4.0)]);
        assert_eq!(mp.to_wkt(), "MULTIPOINT ((1 2), (3 4))");
        assert_eq!(Geometry::from_wkt("MULTIPOINT (1 2, 3 4)").unwrap(), mp);

        let mls = Geometry::MultiLineString(vec![
            vec![Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 1.0)],
            vec![Coordinate::new(2.0, 2.0), Coordinate::new(3.0, 3.0)],
        ]);
        assert_eq!(Geometry::from_wkt(&mls.to_wkt()).unwrap(), mls);

        let mpoly = Geometry::MultiPolygon(vec![vec![square()], vec![square()]]);
        assert_eq!(Geometry::from_wkt(&mpoly.to_wkt()).unwrap(), mpoly);
    }

    #[test]
    fn empty_geometries() {
        assert_eq!(Geometry::LineString(vec![]).to_wkt(), "LINESTRING EMPTY");
        assert_eq!(
            Geometry::from_wkt("POLYGON EMPTY").unwrap(),
            Geometry::Polygon(vec![])
        );
        assert!(Geometry::LineString(vec![]).envelope().is_none());
    }

    #[test]
    fn malformed_wkt_is_rejected() {
        assert!(Geometry::from_wkt("POINT (1)").is_err());
        assert!(Geometry::from_wkt("LINESTRING (1 1, 2 2").is_err());
        assert!(Geometry::from_wkt("CIRCLE (1 1)").is_err());
        assert!(Geometry::from_wkt("POINT (1 1) extra").is_err());
        assert!(Geometry::from_wkt("POINT (1 #)").is_err());
    }

    #[test]
    fn envelope_covers_all_coordinates() {
        let l = Geometry::line_string(&[(1.0, 5.0), (-2.0, 3.0), (4.0, 0.0)]);
        assert_eq!(l.envelope().unwrap(), Envelope::new(-2.0, 4.0, 0.0, 5.0));
        assert_eq!(l.num_points(), 3);
    }

    #[test]
    fn parts_roundtrip_for_every_type() {
        let geoms = vec![
            Geometry::point(1.0, 2.0),
            Geometry::line_string(&[(0.0, 0.0), (1.0, 1.0)]),
            Geometry::Polygon(vec![square()]),
            Geometry::MultiPoint(vec![Coordinate::new(0.0, 1.0), Coordinate::new(2.0, 3.0)]),
            Geometry::MultiLineString(vec![vec![Coordinate::new(0.0, 1.0)], vec![]]),
            Geometry::MultiPolygon(vec![vec![square()]]),
        ];
        for g in geoms {
            let rebuilt = Geometry::from_parts(g.geometry_type(), g.parts()).unwrap();
            assert_eq!(rebuilt, g);
        }
    }

    #[test]
    fn from_parts_rejects_bad_shapes() {
        let two_points = vec![
            vec![vec![Coordinate::new(0.0, 0.0)]],
            vec![vec![Coordinate::new(1.0, 1.0)]],
        ];
        assert!(Geometry::from_parts("Point", two_points).is_err());
        assert!(Geometry::from_parts("Curve", vec![]).is_err());
    }
}
