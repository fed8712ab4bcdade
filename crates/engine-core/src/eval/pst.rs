//! Piece-square tables, from White's point of view, A1 = index 0.
//!
//! Values are (midgame, endgame) pairs in internal units. Black uses the
//! vertically mirrored square.

pub type PstPair = (i32, i32);

#[rustfmt::skip]
pub static PAWN: [PstPair; 64] = [
    (0,0),   (0,0),   (0,0),   (0,0),   (0,0),   (0,0),   (0,0),   (0,0),
    (-28,-8),(-6,-8), (4,-8),  (14,-8), (14,-8), (4,-8),  (-6,-8), (-28,-8),
    (-28,-8),(-6,-8), (9,-8),  (36,-8), (36,-8), (9,-8),  (-6,-8), (-28,-8),
    (-28,-8),(-6,-8), (17,-8), (58,-8), (58,-8), (17,-8), (-6,-8), (-28,-8),
    (-28,-8),(-6,-8), (17,-8), (36,-8), (36,-8), (17,-8), (-6,-8), (-28,-8),
    (-28,-8),(-6,-8), (9,-8),  (14,-8), (14,-8), (9,-8),  (-6,-8), (-28,-8),
    (-28,-8),(-6,-8), (4,-8),  (14,-8), (14,-8), (4,-8),  (-6,-8), (-28,-8),
    (0,0),   (0,0),   (0,0),   (0,0),   (0,0),   (0,0),   (0,0),   (0,0),
];

#[rustfmt::skip]
pub static KNIGHT: [PstPair; 64] = [
    (-135,-104),(-107,-79),(-80,-55),(-67,-42),(-67,-42),(-80,-55),(-107,-79),(-135,-104),
    (-93,-79),  (-67,-55), (-39,-30),(-25,-17),(-25,-17),(-39,-30),(-67,-55), (-93,-79),
    (-53,-55),  (-25,-30), (1,-6),   (13,6),   (13,6),   (1,-6),   (-25,-30), (-53,-55),
    (-25,-42),  (1,-17),   (27,6),   (41,19),  (41,19),  (27,6),   (1,-17),   (-25,-42),
    (-11,-42),  (13,-17),  (41,6),   (55,19),  (55,19),  (41,6),   (13,-17),  (-11,-42),
    (-11,-55),  (13,-30),  (41,-6),  (55,6),   (55,6),   (41,-6),  (13,-30),  (-11,-55),
    (-53,-79),  (-25,-55), (1,-30),  (13,-17), (13,-17), (1,-30),  (-25,-55), (-53,-79),
    (-193,-104),(-67,-79), (-39,-55),(-25,-42),(-25,-42),(-39,-55),(-67,-79), (-193,-104),
];

#[rustfmt::skip]
pub static BISHOP: [PstPair; 64] = [
    (-40,-59),(-40,-42),(-35,-35),(-30,-26),(-30,-26),(-35,-35),(-40,-42),(-40,-59),
    (-17,-42),(0,-26),  (-4,-18), (0,-11),  (0,-11),  (-4,-18), (0,-26),  (-17,-42),
    (-13,-35),(-4,-18), (8,-11),  (4,-4),   (4,-4),   (8,-11),  (-4,-18), (-13,-35),
    (-8,-26), (0,-11),  (4,-4),   (17,4),   (17,4),   (4,-4),   (0,-11),  (-8,-26),
    (-8,-26), (0,-11),  (4,-4),   (17,4),   (17,4),   (4,-4),   (0,-11),  (-8,-26),
    (-13,-35),(-4,-18), (8,-11),  (4,-4),   (4,-4),   (8,-11),  (-4,-18), (-13,-35),
    (-17,-42),(0,-26),  (-4,-18), (0,-11),  (0,-11),  (-4,-18), (0,-26),  (-17,-42),
    (-17,-59),(-17,-42),(-13,-35),(-8,-26), (-8,-26), (-13,-35),(-17,-42),(-17,-59),
];

#[rustfmt::skip]
pub static ROOK: [PstPair; 64] = [
    (-12,3),(-7,3),(-2,3),(2,3),(2,3),(-2,3),(-7,3),(-12,3),
    (-12,3),(-7,3),(-2,3),(2,3),(2,3),(-2,3),(-7,3),(-12,3),
    (-12,3),(-7,3),(-2,3),(2,3),(2,3),(-2,3),(-7,3),(-12,3),
    (-12,3),(-7,3),(-2,3),(2,3),(2,3),(-2,3),(-7,3),(-12,3),
    (-12,3),(-7,3),(-2,3),(2,3),(2,3),(-2,3),(-7,3),(-12,3),
    (-12,3),(-7,3),(-2,3),(2,3),(2,3),(-2,3),(-7,3),(-12,3),
    (-12,3),(-7,3),(-2,3),(2,3),(2,3),(-2,3),(-7,3),(-12,3),
    (-12,3),(-7,3),(-2,3),(2,3),(2,3),(-2,3),(-7,3),(-12,3),
];

#[rustfmt::skip]
pub static QUEEN: [PstPair; 64] = [
    (8,-80),(8,-54),(8,-42),(8,-30),(8,-30),(8,-42),(8,-54),(8,-80),
    (8,-54),(8,-30),(8,-18),(8,-6), (8,-6), (8,-18),(8,-30),(8,-54),
    (8,-42),(8,-18),(8,-6), (8,6),  (8,6),  (8,-6), (8,-18),(8,-42),
    (8,-30),(8,-6), (8,6),  (8,18), (8,18), (8,6),  (8,-6), (8,-30),
    (8,-30),(8,-6), (8,6),  (8,18), (8,18), (8,6),  (8,-6), (8,-30),
    (8,-42),(8,-18),(8,-6), (8,6),  (8,6),  (8,-6), (8,-18),(8,-42),
    (8,-54),(8,-30),(8,-18),(8,-6), (8,-6), (8,-18),(8,-30),(8,-54),
    (8,-80),(8,-54),(8,-42),(8,-30),(8,-30),(8,-42),(8,-54),(8,-80),
];

#[rustfmt::skip]
pub static KING: [PstPair; 64] = [
    (287,18), (311,77), (262,105),(214,135),(214,135),(262,105),(311,77), (287,18),
    (262,77), (287,135),(238,165),(190,193),(190,193),(238,165),(287,135),(262,77),
    (214,105),(238,165),(190,193),(142,222),(142,222),(190,193),(238,165),(214,105),
    (190,135),(214,193),(167,222),(119,251),(119,251),(167,222),(214,193),(190,135),
    (167,135),(190,193),(142,222),(94,251), (94,251), (142,222),(190,193),(167,135),
    (142,105),(167,165),(119,193),(69,222), (69,222), (119,193),(167,165),(142,105),
    (119,77), (142,135),(94,165), (46,193), (46,193), (94,165), (142,135),(119,77),
    (94,18),  (119,77), (78,105), (31,135), (31,135), (78,105), (119,77), (94,18),
];
