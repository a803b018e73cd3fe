//! C# snippets printed by `--sampleusage` and `--sampleclass`.

pub const SAMPLE_USAGE: &str = r#"// Mark public static methods with the export attribute:

using System.Runtime.InteropServices;

public static class Exports
{
    [DllExport("Add", CallingConvention.Cdecl)]
    public static int Add(int a, int b)
    {
        return a + b;
    }

    [DllExport("Greet", CallingConvention.StdCall)]
    public static int Greet([MarshalAs(UnmanagedType.LPWStr)] string name)
    {
        return name.Length;
    }
}

// Then build the project and run:
//
//   netexport --platform=x86 --create-header=Exports.h --create-lib bin\Release\Sample.dll
//
// This writes NativeExports.Sample.dll next to Sample.dll, plus Exports.h,
// NativeExports.Sample.def and NativeExports.Sample.lib. Pass --merge to add
// the exports to Sample.dll itself (the original is kept as Sample.dll.orig).
"#;

pub const SAMPLE_CLASS: &str = r#"using System;
using System.Runtime.InteropServices;

/// <summary>
/// Marks a public static method for native export.
/// </summary>
[AttributeUsage(AttributeTargets.Method, AllowMultiple = false, Inherited = false)]
public sealed class DllExportAttribute : Attribute
{
    public DllExportAttribute(string exportName, CallingConvention callingConvention)
    {
        ExportName = exportName;
        CallingConvention = callingConvention;
    }

    /// <summary>Symbol the native export is published under.</summary>
    public string ExportName { get; set; }

    /// <summary>Calling convention of the native entry point.</summary>
    public CallingConvention CallingConvention { get; set; }
}
"#;
