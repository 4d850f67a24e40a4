//! FEN reading and writing.
//!
//! Only the first four fields matter (pieces, side, castling, en passant);
//! the halfmove and fullmove counters are accepted but ignored, matching
//! what the search actually consumes.

use std::str::FromStr;

use super::error::FenError;
use super::position::{castle, Position};
use super::types::piece::{Piece, PieceKind, Side};
use super::types::square::Square;

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -";

impl Position {
    #[must_use]
    pub fn startpos() -> Position {
        Position::from_fen(START_FEN).expect("start position FEN is valid")
    }

    /// Parse a FEN string into a fully derived position (phase, incremental
    /// scores, hashes, pins and check state are all recomputed).
    pub fn from_fen(fen: &str) -> Result<Position, FenError> {
        let mut fields = fen.split_whitespace();
        let board_field = fields.next().ok_or_else(|| FenError::BadBoard(String::new()))?;
        let side_field = fields.next().ok_or_else(|| FenError::BadSide(String::new()))?;
        let castling_field = fields.next().unwrap_or("-");
        let ep_field = fields.next().unwrap_or("-");

        let mut pos = Position::empty();

        let mut sq = 0usize;
        for c in board_field.chars() {
            match c {
                '/' => {
                    if sq % 8 != 0 {
                        return Err(FenError::BadBoard(board_field.to_string()));
                    }
                }
                '1'..='8' => sq += c as usize - '0' as usize,
                _ => {
                    if sq >= 64 {
                        return Err(FenError::BadBoard(board_field.to_string()));
                    }
                    let piece = Piece::from_fen_char(c)
                        .map_err(|_| FenError::BadBoard(board_field.to_string()))?;
                    pos.put_piece(piece, Square::from_index(sq));
                    sq += 1;
                }
            }
            if sq > 64 {
                return Err(FenError::BadBoard(board_field.to_string()));
            }
        }
        if sq != 64 {
            return Err(FenError::BadBoard(board_field.to_string()));
        }

        pos.side = match side_field {
            "w" => Side::White,
            "b" => Side::Black,
            other => return Err(FenError::BadSide(other.to_string())),
        };

        if castling_field != "-" {
            for c in castling_field.chars() {
                pos.c_flag |= match c {
                    'K' => castle::WHITE_KING_SIDE,
                    'Q' => castle::WHITE_QUEEN_SIDE,
                    'k' => castle::BLACK_KING_SIDE,
                    'q' => castle::BLACK_QUEEN_SIDE,
                    _ => return Err(FenError::BadCastling(castling_field.to_string())),
                };
            }
        }

        if ep_field != "-" {
            let ep = Square::from_str(ep_field)
                .map_err(|_| FenError::BadEnPassant(ep_field.to_string()))?;
            pos.ep_sq = Some(ep);
        }

        for side in Side::BOTH {
            let k = pos.king_sq(side);
            if k.is_none() || !pos.piece_at(k).is_kind(PieceKind::King) {
                return Err(FenError::BadKings);
            }
        }

        pos.set_phase();
        pos.reevaluate();
        pos.rehash();
        pos.set_pins_and_checks();
        Ok(pos)
    }

    /// Place a piece on an empty square during position setup. Derived
    /// state is left stale; callers finish with the recompute passes.
    fn put_piece(&mut self, piece: Piece, sq: Square) {
        self.board[sq.index()] = piece;
        self.occ[piece.side().index()] |= sq.bb();
        if piece.is_kind(PieceKind::King) {
            self.k_sq[piece.side().index()] = sq;
        } else {
            self.piece_occ[piece.kind().index()] |= sq.bb();
        }
    }

    /// Serialise the position back to a 4-field FEN.
    #[must_use]
    pub fn to_fen(&self) -> String {
        let mut fen = String::new();
        for rank in 0..8 {
            let mut empty = 0;
            for file in 0..8 {
                let piece = self.piece_at(Square::new(rank, file));
                if piece.is_empty() {
                    empty += 1;
                } else {
                    if empty > 0 {
                        fen.push((b'0' + empty) as char);
                        empty = 0;
                    }
                    fen.push(piece.to_fen_char());
                }
            }
            if empty > 0 {
                fen.push((b'0' + empty) as char);
            }
            if rank < 7 {
                fen.push('/');
            }
        }

        fen.push(' ');
        fen.push(if self.side == Side::White { 'w' } else { 'b' });

        fen.push(' ');
        if self.c_flag == 0 {
            fen.push('-');
        } else {
            for (flag, c) in [
                (castle::WHITE_KING_SIDE, 'K'),
                (castle::WHITE_QUEEN_SIDE, 'Q'),
                (castle::BLACK_KING_SIDE, 'k'),
                (castle::BLACK_QUEEN_SIDE, 'q'),
            ] {
                if self.c_flag & flag != 0 {
                    fen.push(c);
                }
            }
        }

        fen.push(' ');
        match self.ep_sq {
            Some(sq) => fen.push_str(&sq.to_string()),
            None => fen.push('-'),
        }
        fen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startpos() {
        let pos = Position::startpos();
        assert_eq!(pos.side, Side::White);
        assert_eq!(pos.c_flag, castle::ALL);
        assert_eq!(pos.ep_sq, None);
        assert_eq!(pos.occupied().count_ones(), 32);
        assert_eq!(pos.phase, 0);
        assert!(!pos.in_check);
        assert_eq!(pos.king_sq(Side::White), "e1".parse().unwrap());
        assert_eq!(pos.king_sq(Side::Black), "e8".parse().unwrap());
    }

    #[test]
    fn test_fen_roundtrip() {
        for fen in [
            START_FEN,
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq -",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - -",
            "rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq d6",
            "7k/5Q2/6K1/8/8/8/8/8 b - -",
        ] {
            let pos = Position::from_fen(fen).unwrap();
            assert_eq!(pos.to_fen(), fen);
        }
    }

    #[test]
    fn test_fen_ignores_move_counters() {
        let a = Position::from_fen(START_FEN).unwrap();
        let b = Position::from_fen(&format!("{START_FEN} 12 34")).unwrap();
        assert_eq!(a.key, b.key);
    }

    #[test]
    fn test_fen_errors() {
        assert!(Position::from_fen("").is_err());
        assert!(Position::from_fen("rnbqkbnr/pppppppp w KQkq -").is_err());
        assert!(Position::from_fen("8/8/8/8/8/8/8/8 w - -").is_err());
        assert!(Position::from_fen(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR x KQkq -"
        )
        .is_err());
        assert!(Position::from_fen(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KXkq -"
        )
        .is_err());
    }

    #[test]
    fn test_check_detection_from_fen() {
        let pos =
            Position::from_fen("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq -")
                .unwrap();
        assert!(pos.in_check);
    }

    #[test]
    fn test_phase_counts_missing_material() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/4K3 w - -").unwrap();
        assert_eq!(pos.phase, TOTAL_PHASE_TEST);
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/Q3K3 w - -").unwrap();
        assert_eq!(pos.phase, TOTAL_PHASE_TEST - 24);
    }

    const TOTAL_PHASE_TEST: i32 = 128;
}
